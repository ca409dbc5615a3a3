use std::path::PathBuf;

use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] stockpulse_core::ValidationError),

    #[error(transparent)]
    Config(#[from] stockpulse_core::ConfigError),

    #[error("failed to read settings {}: {source}", path.display())]
    SettingsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings {}: {source}", path.display())]
    SettingsParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid log filter: {0}")]
    Logging(String),

    #[error("no symbols to fetch: pass SYMBOL... or set market.stock_list")]
    EmptyStockList,

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_)
            | Self::SettingsRead { .. }
            | Self::SettingsParse { .. }
            | Self::Logging(_)
            | Self::EmptyStockList => 2,
            Self::Validation(_) => 4,
            Self::Serialization(_) => 1,
        }
    }
}
