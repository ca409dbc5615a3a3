//! Settings resolution: defaults, then the TOML file, then environment,
//! then command-line flags.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use stockpulse_core::{ConfigError, FetchSettings, MarketMode, SourceCredentials, SourceId};

use crate::error::CliError;

pub const ENV_MARKET: &str = "STOCKPULSE_MARKET";
pub const ENV_STOCK_LIST: &str = "STOCKPULSE_STOCK_LIST";
pub const ENV_TUSHARE_TOKEN: &str = "STOCKPULSE_TUSHARE_TOKEN";
pub const ENV_TUSHARE_TOKEN_FALLBACK: &str = "TUSHARE_TOKEN";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    pub market: MarketSection,
    pub fetch: FetchSection,
    pub credentials: CredentialsSection,
    pub log: LogSection,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarketSection {
    pub tag: String,
    pub stock_list: Vec<String>,
}

impl Default for MarketSection {
    fn default() -> Self {
        Self {
            tag: String::from("cn"),
            stock_list: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSection {
    pub timeout_ms: u64,
    pub history_days: u32,
    pub min_records: usize,
    pub concurrency: usize,
    pub disabled_sources: Vec<String>,
    pub max_retries: Option<u32>,
}

impl Default for FetchSection {
    fn default() -> Self {
        let defaults = FetchSettings::default();
        Self {
            timeout_ms: defaults.source_timeout.as_millis() as u64,
            history_days: defaults.history_days,
            min_records: defaults.min_records,
            concurrency: defaults.concurrency,
            disabled_sources: Vec::new(),
            max_retries: defaults.max_retries,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsSection {
    pub tushare_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub level: String,
    pub format: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

pub fn load_file(path: &Path) -> Result<SettingsFile, CliError> {
    let contents = fs::read_to_string(path).map_err(|source| CliError::SettingsRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| CliError::SettingsParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Flag values that win over every other layer.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub market: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Fully resolved settings handed to the commands.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: MarketMode,
    pub stock_list: Vec<String>,
    pub fetch: FetchSettings,
    pub credentials: SourceCredentials,
    pub log_level: String,
    pub log_format: String,
}

impl Settings {
    /// Resolves the layers. `env` is injected so tests never touch the
    /// process environment.
    pub fn resolve(
        file: SettingsFile,
        env: impl Fn(&str) -> Option<String>,
        overrides: &Overrides,
    ) -> Result<Self, CliError> {
        let env = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        let tag = overrides
            .market
            .clone()
            .or_else(|| env(ENV_MARKET))
            .unwrap_or(file.market.tag);
        let mode = MarketMode::select(&tag)?;

        let stock_list = match env(ENV_STOCK_LIST) {
            Some(list) => split_list(&list),
            None => file.market.stock_list,
        };

        let disabled_sources = file
            .fetch
            .disabled_sources
            .iter()
            .map(|name| {
                name.parse::<SourceId>()
                    .map_err(|error| ConfigError::InvalidSetting {
                        field: "fetch.disabled_sources",
                        reason: error.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let timeout_ms = overrides.timeout_ms.unwrap_or(file.fetch.timeout_ms);
        let fetch = FetchSettings {
            source_timeout: Duration::from_millis(timeout_ms),
            history_days: file.fetch.history_days,
            min_records: file.fetch.min_records,
            concurrency: file.fetch.concurrency,
            disabled_sources,
            max_retries: file.fetch.max_retries,
        };
        fetch.validate()?;

        let token = env(ENV_TUSHARE_TOKEN)
            .or_else(|| env(ENV_TUSHARE_TOKEN_FALLBACK))
            .or(file.credentials.tushare_token);
        let credentials = match token {
            Some(token) => SourceCredentials::default().with_tushare_token(token),
            None => SourceCredentials::default(),
        };

        Ok(Self {
            mode,
            stock_list,
            fetch,
            credentials,
            log_level: file.log.level,
            log_format: file.log.format,
        })
    }

    /// Loads the optional file and resolves against the real environment.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self, CliError> {
        let file = match path {
            Some(path) => load_file(path)?,
            None => SettingsFile::default(),
        };
        Self::resolve(file, |name| std::env::var(name).ok(), overrides)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}
