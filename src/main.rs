//! cartcast - command-line entry point

use cartcast::cli::{cmd_backtest, cmd_describe, cmd_run, Cli, Commands};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cartcast=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { data, mode, head, tail, config } => {
            cmd_run(&data, &mode, head, tail, config.as_deref())?;
        }
        Commands::Describe { data, target } => {
            cmd_describe(&data, &target)?;
        }
        Commands::Backtest { train, train_rows, evaluate, config } => {
            cmd_backtest(&train, train_rows, &evaluate, config.as_deref())?;
        }
    }

    Ok(())
}
