mod cli;
mod commands;
mod error;
mod logging;
mod output;
mod settings;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::Cli;
use crate::error::CliError;
use crate::settings::{Overrides, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    let overrides = Overrides {
        market: cli.market.clone(),
        timeout_ms: cli.timeout_ms,
    };
    let settings = Settings::load(cli.config.as_deref(), &overrides)?;
    logging::init_tracing(&settings.log_level, &settings.log_format)?;

    let envelope = commands::run(&cli, settings).await?;
    output::render(&envelope, cli.pretty)?;

    if !envelope.is_ok() {
        return Ok(ExitCode::from(3));
    }

    Ok(ExitCode::SUCCESS)
}
