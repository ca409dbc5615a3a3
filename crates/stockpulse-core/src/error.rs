use thiserror::Error;

/// Validation errors raised while constructing domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("domestic symbol must be a 6-digit code: '{value}'")]
    InvalidDomesticCode { value: String },
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid source '{value}', expected one of eastmoney, sina, tushare, tencent, yahoo")]
    InvalidSource { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("date must be formatted as YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },
    #[error("date range start {start} is after end {end}")]
    InvertedDateRange { start: String, end: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("price record high must be >= low")]
    InvalidPriceRange,
    #[error("ratio '{field}' must lie within [0, 1]")]
    RatioOutOfRange { field: &'static str },
}

/// Fatal configuration problems detected while wiring sources at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown market tag '{value}', expected one of cn, us")]
    UnknownMarket { value: String },
    #[error("source '{source_name}' requires a credential ({hint})")]
    MissingCredential {
        source_name: &'static str,
        hint: &'static str,
    },
    #[error("source '{source_name}' does not serve the {market} market")]
    UnsupportedMarket {
        source_name: &'static str,
        market: &'static str,
    },
    #[error("duplicate priority rank {rank} in the {market} source list")]
    DuplicateRank { rank: u8, market: &'static str },
    #[error("source '{source_name}' is listed twice for the {market} market")]
    DuplicateSource {
        source_name: &'static str,
        market: &'static str,
    },
    #[error("no enabled sources remain for the {market} market")]
    NoSources { market: &'static str },
    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}
