use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Equity universe a symbol belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    /// Mainland A-share equities.
    Domestic,
    /// US-listed equities.
    International,
}

impl Market {
    pub const ALL: [Self; 2] = [Self::Domestic, Self::International];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Domestic => "cn",
            Self::International => "us",
        }
    }

    /// Parses an operator-supplied market tag.
    pub fn from_tag(tag: &str) -> Result<Self, ConfigError> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "cn" | "a" | "domestic" => Ok(Self::Domestic),
            "us" | "international" => Ok(Self::International),
            other => Err(ConfigError::UnknownMarket {
                value: other.to_owned(),
            }),
        }
    }
}

impl Display for Market {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_tag(value)
    }
}

/// Domestic stock exchange, needed by sources that key symbols by venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exchange {
    Shanghai,
    Shenzhen,
    Beijing,
}

impl Exchange {
    /// Infers the listing venue from the leading digit of a 6-digit code.
    /// Shanghai also owns the `5` fund and `7` subscription ranges.
    pub fn infer(code: &str) -> Self {
        match code.as_bytes().first() {
            Some(b'5' | b'6' | b'7' | b'9') => Self::Shanghai,
            Some(b'4' | b'8') => Self::Beijing,
            _ => Self::Shenzhen,
        }
    }

    /// Two-letter lowercase prefix used by Sina and Tencent (`sh600519`).
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Shanghai => "sh",
            Self::Shenzhen => "sz",
            Self::Beijing => "bj",
        }
    }

    /// Uppercase suffix used by Tushare (`600519.SH`).
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Shanghai => "SH",
            Self::Shenzhen => "SZ",
            Self::Beijing => "BJ",
        }
    }
}
