//! ra-models - Main Entry Point

use clap::Parser;
use ra_models::cli::{cmd_params, cmd_train, Cli, Commands, TrainArgs};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ra_models=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Train { .. } => {
            if let Some((model, args)) = TrainArgs::from_command(&cli.command)? {
                cmd_train(model, &args)?;
            }
        }
        Commands::Params { model, features } => {
            cmd_params(*model, *features)?;
        }
    }

    Ok(())
}
