//! `watchpost state`: a look into the persisted state file.

use clap::Parser;
use serde_json::json;

use super::{CommandError, ConfigArgs};
use crate::persistence::StateStore;

/// Arguments of `watchpost state`.
#[derive(Parser, Debug)]
pub struct StateArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Number of recent notifications to print.
    #[arg(short, long, default_value_t = 10)]
    limit: usize,
}

/// Prints statistics and the latest notifications of the state file.
pub async fn execute(args: StateArgs) -> Result<(), CommandError> {
    let config = args.config.load_config()?;
    let path = config.state_file_path.ok_or(CommandError::NoStateFile)?;

    let store = StateStore::load(path.clone()).await;
    let stats = store.stats().await;
    let recent = store.recent_notifications(args.limit).await;
    let report = json!({
        "path": path,
        "stats": stats,
        "recent_notifications": recent,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
