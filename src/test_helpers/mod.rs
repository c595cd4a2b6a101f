//! A set of helpers for testing

mod context;
mod fetcher;
mod notifier;
mod resolver;
mod target;

pub use context::{TestContext, TestContextBuilder};
pub use fetcher::ScriptedFetcher;
pub use notifier::{RecordingNotifier, SentNotification};
pub use resolver::StaticResolver;
pub use target::TargetBuilder;
