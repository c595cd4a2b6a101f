//! Configuration module for Watchpost.

mod app_config;
mod helpers;
mod loader;
mod notifier;
mod validation;

pub use app_config::{AppConfig, AppConfigBuilder, DEFAULT_USER_AGENT};
pub use helpers::{
    deserialize_duration_from_hours, deserialize_duration_from_minutes,
    deserialize_duration_from_ms, deserialize_duration_from_seconds, serialize_duration_to_ms,
};
pub use loader::{ConfigLoader, LoaderError, load_targets};
pub use notifier::NotifierConfig;
pub use validation::{ConfigValidationError, validate_targets};
