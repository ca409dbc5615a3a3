use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical identifiers of the market data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Eastmoney,
    Sina,
    Tushare,
    Tencent,
    Yahoo,
}

impl SourceId {
    pub const ALL: [Self; 5] = [
        Self::Eastmoney,
        Self::Sina,
        Self::Tushare,
        Self::Tencent,
        Self::Yahoo,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eastmoney => "eastmoney",
            Self::Sina => "sina",
            Self::Tushare => "tushare",
            Self::Tencent => "tencent",
            Self::Yahoo => "yahoo",
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "eastmoney" | "efinance" => Ok(Self::Eastmoney),
            "sina" => Ok(Self::Sina),
            "tushare" => Ok(Self::Tushare),
            "tencent" => Ok(Self::Tencent),
            "yahoo" | "yfinance" => Ok(Self::Yahoo),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("EFinance".parse::<SourceId>(), Ok(SourceId::Eastmoney));
        assert_eq!(" yfinance ".parse::<SourceId>(), Ok(SourceId::Yahoo));
        assert!(matches!(
            "baostock".parse::<SourceId>(),
            Err(ValidationError::InvalidSource { .. })
        ));
    }
}
