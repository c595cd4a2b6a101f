//! Command line subcommands.

pub mod check;
pub mod run;
pub mod state;

use clap::Args;
use thiserror::Error;

use crate::{
    config::{AppConfig, ConfigValidationError, LoaderError, load_targets, validate_targets},
    fetcher::FetchError,
    matcher::MatcherError,
    models::Target,
    supervisor::SupervisorError,
};

/// Errors surfaced by the subcommands.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The application configuration could not be read.
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    /// The targets file could not be read.
    #[error("Target loading error: {0}")]
    TargetLoading(#[from] LoaderError),
    /// The configuration or the targets are invalid.
    #[error(transparent)]
    Validation(#[from] ConfigValidationError),
    /// The supervisor could not be built.
    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),
    /// The HTTP client could not be built.
    #[error("Fetcher error: {0}")]
    Fetcher(#[from] FetchError),
    /// An extraction pattern is invalid.
    #[error("Matcher error: {0}")]
    Matcher(#[from] MatcherError),
    /// Output could not be serialized.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// No configured target matches the selection.
    #[error("No target matches '{0}'")]
    UnknownTarget(String),
    /// The command needs a state file but none is configured.
    #[error("No state_file_path configured")]
    NoStateFile,
}

/// Location of the configuration files.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Directory containing app.yaml and targets.yaml.
    #[arg(short, long, default_value = "configs")]
    pub config_dir: String,
}

impl ConfigArgs {
    /// Loads and validates the application configuration.
    pub fn load_config(&self) -> Result<AppConfig, CommandError> {
        let config = AppConfig::new(Some(&self.config_dir))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates the targets referenced by `config`.
    pub fn load_targets(&self, config: &AppConfig) -> Result<Vec<Target>, CommandError> {
        let targets = load_targets(config.targets_config_path.clone())?;
        validate_targets(&targets)?;
        tracing::debug!(count = targets.len(), path = %config.targets_config_path.display(), "Targets loaded.");
        Ok(targets)
    }
}
