use std::fmt::{Debug, Formatter};
use std::time::Duration;

use crate::{ConfigError, SourceId};

/// Fetch behaviour threaded explicitly into the registry and coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Budget for one source call, retries included.
    pub source_timeout: Duration,
    /// Default history window in calendar days.
    pub history_days: u32,
    /// Smallest history accepted without falling through to the next source.
    pub min_records: usize,
    /// Worker pool size for batch runs.
    pub concurrency: usize,
    /// Sources switched off by the operator.
    pub disabled_sources: Vec<SourceId>,
    /// Transport retry override applied to every source.
    pub max_retries: Option<u32>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(20),
            history_days: 90,
            min_records: 1,
            concurrency: 4,
            disabled_sources: Vec::new(),
            max_retries: None,
        }
    }
}

impl FetchSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_timeout.is_zero() {
            return Err(ConfigError::InvalidSetting {
                field: "fetch.timeout_ms",
                reason: String::from("must be greater than zero"),
            });
        }
        if self.history_days == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "fetch.history_days",
                reason: String::from("must be greater than zero"),
            });
        }
        if self.min_records == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "fetch.min_records",
                reason: String::from("must be greater than zero"),
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "fetch.concurrency",
                reason: String::from("must be greater than zero"),
            });
        }
        Ok(())
    }

    pub fn is_disabled(&self, id: SourceId) -> bool {
        self.disabled_sources.contains(&id)
    }
}

/// Per-source secrets. `Debug` never prints them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SourceCredentials {
    pub tushare_token: Option<String>,
}

impl SourceCredentials {
    pub fn with_tushare_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.tushare_token = (!token.trim().is_empty()).then(|| token.trim().to_owned());
        self
    }

    pub fn tushare_token(&self) -> Option<&str> {
        self.tushare_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

impl Debug for SourceCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let redacted = |value: &Option<String>| if value.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("SourceCredentials")
            .field("tushare_token", &redacted(&self.tushare_token))
            .finish()
    }
}
