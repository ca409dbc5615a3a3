//! Fetcher contract and request/response types.
//!
//! This module defines the uniform contract (`DataSource`) every market data
//! source implements, along with the structured per-source error used by the
//! failover coordinator.
//!
//! # Endpoints
//!
//! | Endpoint | Method | Response |
//! |----------|--------|----------|
//! | History | [`DataSource::fetch_history`] | [`PriceHistory`] |
//! | Quote | [`DataSource::fetch_quote`] | [`Quote`] |
//! | Chip distribution | [`DataSource::fetch_chip_distribution`] | [`ChipOutcome`] |
//!
//! # Example
//!
//! ```rust,ignore
//! use stockpulse_core::{DataSource, Market, SourceSymbol, Symbol, TradeDate, YahooSource};
//!
//! async fn last_close(source: &YahooSource) -> Option<f64> {
//!     let symbol = Symbol::parse("AAPL", Market::International).ok()?;
//!     let target = SourceSymbol::for_source(source, symbol);
//!     let end = TradeDate::today_utc();
//!     let history = source.fetch_history(&target, end.minus_days(30), end).await.ok()?;
//!     history.latest().map(|record| record.close)
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{ChipOutcome, Market, PriceHistory, Quote, SourceId, Symbol, TradeDate, ValidationError};

/// Data endpoint type used for capability checks and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    History,
    Quote,
    ChipDistribution,
}

impl Endpoint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Quote => "quote",
            Self::ChipDistribution => "chip_distribution",
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported endpoint matrix for a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub history: bool,
    pub quote: bool,
    pub chip_distribution: bool,
}

impl CapabilitySet {
    pub const fn new(history: bool, quote: bool, chip_distribution: bool) -> Self {
        Self {
            history,
            quote,
            chip_distribution,
        }
    }

    /// History and quotes, no chip distribution.
    pub const fn prices_only() -> Self {
        Self::new(true, true, false)
    }

    pub const fn full() -> Self {
        Self::new(true, true, true)
    }

    pub const fn supports(self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::History => self.history,
            Endpoint::Quote => self.quote,
            Endpoint::ChipDistribution => self.chip_distribution,
        }
    }

    pub fn supported_endpoints(self) -> Vec<&'static str> {
        let mut values = Vec::with_capacity(3);
        if self.history {
            values.push(Endpoint::History.as_str());
        }
        if self.quote {
            values.push(Endpoint::Quote.as_str());
        }
        if self.chip_distribution {
            values.push(Endpoint::ChipDistribution.as_str());
        }
        values
    }
}

/// Static facts a source declares about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceProfile {
    pub id: SourceId,
    pub markets: &'static [Market],
    pub capabilities: CapabilitySet,
    pub requires_credentials: bool,
}

impl SourceProfile {
    pub fn serves(&self, market: Market) -> bool {
        self.markets.contains(&market)
    }
}

/// Per-source failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    /// Network, auth, timeout or malformed upstream payload.
    Unavailable,
    /// The source has no data for a valid symbol.
    SymbolNotFound,
    /// Source-imposed throttling.
    RateLimited,
}

/// Structured source error recorded by the failover coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn symbol_not_found(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::SymbolNotFound,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::SymbolNotFound => "source.symbol_not_found",
            SourceErrorKind::RateLimited => "source.rate_limited",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<ValidationError> for SourceError {
    /// A payload that fails domain validation is a malformed upstream answer.
    fn from(error: ValidationError) -> Self {
        Self::unavailable(format!("upstream payload failed validation: {error}"))
    }
}

/// A symbol together with the exact string one source expects for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSymbol {
    pub symbol: Symbol,
    pub canonical: String,
}

impl SourceSymbol {
    pub fn for_source(source: &dyn DataSource, symbol: Symbol) -> Self {
        let canonical = source.canonicalize(&symbol);
        Self { symbol, canonical }
    }
}

/// Caller-level history request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub symbol: Symbol,
    pub start: TradeDate,
    pub end: TradeDate,
    /// Smallest record count accepted as a complete answer.
    pub min_records: usize,
}

impl HistoryRequest {
    pub fn new(symbol: Symbol, start: TradeDate, end: TradeDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self {
            symbol,
            start,
            end,
            min_records: 1,
        })
    }

    /// Window of `days` calendar days ending today (UTC).
    pub fn trailing_days(symbol: Symbol, days: u32) -> Self {
        let end = TradeDate::today_utc();
        Self {
            symbol,
            start: end.minus_days(days),
            end,
            min_records: 1,
        }
    }

    pub fn with_min_records(mut self, min_records: usize) -> Self {
        self.min_records = min_records.max(1);
        self
    }
}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Market data source contract.
///
/// Every call is independent and safe to retry; implementations keep no
/// per-request state beyond their own breaker and rate budget.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared across the
/// batch worker pool.
pub trait DataSource: Send + Sync {
    /// Returns the unique source identifier.
    fn id(&self) -> SourceId;

    /// Static markets/capabilities/credential facts.
    fn profile(&self) -> SourceProfile;

    /// Converts a validated symbol into the string this source's API expects.
    ///
    /// Pure: no I/O and no failure path. The market is carried by the symbol.
    fn canonicalize(&self, symbol: &Symbol) -> String;

    /// Fetches daily records for `[start, end]`, ascending by date.
    fn fetch_history<'a>(
        &'a self,
        target: &'a SourceSymbol,
        start: TradeDate,
        end: TradeDate,
    ) -> SourceFuture<'a, PriceHistory>;

    /// Fetches the latest quote.
    fn fetch_quote<'a>(&'a self, target: &'a SourceSymbol) -> SourceFuture<'a, Quote>;

    /// Fetches chip distribution. Sources whose profile does not declare the
    /// capability keep this default.
    fn fetch_chip_distribution<'a>(&'a self, target: &'a SourceSymbol) -> SourceFuture<'a, ChipOutcome> {
        let _ = target;
        Box::pin(async { Ok(ChipOutcome::NotApplicable) })
    }
}
