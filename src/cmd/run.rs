//! `watchpost run`: the long-running supervisor.

use clap::Parser;

use super::{CommandError, ConfigArgs};
use crate::supervisor::Supervisor;

/// Arguments of `watchpost run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

/// Runs the supervisor until SIGINT or SIGTERM.
pub async fn execute(args: RunArgs) -> Result<(), CommandError> {
    tracing::debug!(config_dir = %args.config.config_dir, "Loading application configuration...");
    let config = args.config.load_config()?;
    let targets = args.config.load_targets(&config)?;
    tracing::info!(
        targets = targets.len(),
        interval_secs = config.check_interval_secs.as_secs(),
        state_file = ?config.state_file_path,
        "Configuration loaded."
    );

    let supervisor =
        Supervisor::builder().config(config).targets(targets).handle_signals(true).build().await?;

    tracing::info!("Supervisor initialized, starting monitoring...");
    supervisor.run().await?;

    Ok(())
}
