//! This module contains the durable state of the Watchpost application: the
//! notification history that backs rate limiting and the fingerprints that
//! back deduplication.

pub mod error;
pub mod state_store;

pub use error::PersistenceError;
pub use state_store::StateStore;
