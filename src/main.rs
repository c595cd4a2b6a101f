use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use watchpost::cmd::{
    check::{self, CheckArgs},
    run::{self, RunArgs},
    state::{self, StateArgs},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the monitoring supervisor until interrupted.
    Run(RunArgs),
    /// Polls every target once and prints the outcome, without notifying.
    Check(CheckArgs),
    /// Prints statistics and recent notifications from the state file.
    State(StateArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run::execute(args).await?,
        Commands::Check(args) => check::execute(args).await?,
        Commands::State(args) => state::execute(args).await?,
    }

    Ok(())
}
