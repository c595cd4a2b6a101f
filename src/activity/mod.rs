//! In-memory activity history: the state-change event ring and the
//! non-blocking activity log.

pub mod log_sink;
pub mod ring_buffer;

pub use log_sink::{LogEntry, LogSink};
pub use ring_buffer::{EventLog, RingBuffer};
