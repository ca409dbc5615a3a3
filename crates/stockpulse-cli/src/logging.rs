use tracing_subscriber::EnvFilter;

use crate::error::CliError;

/// Installs the global subscriber. Logs go to stderr so stdout stays JSON.
///
/// `STOCKPULSE_LOG` takes precedence over the configured level.
pub fn init_tracing(log_level: &str, log_format: &str) -> Result<(), CliError> {
    let filter = std::env::var("STOCKPULSE_LOG").unwrap_or_else(|_| log_level.to_string());
    let env_filter = EnvFilter::try_new(filter).map_err(|err| CliError::Logging(err.to_string()))?;

    let format = log_format.trim().to_lowercase();
    if format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
