//! # Stockpulse Core
//!
//! Multi-source market data fetching with ordered failover.
//!
//! ## Overview
//!
//! - **Normalized domain models** for daily prices, quotes and chip distribution
//! - **Source contract** shared by every upstream ([`DataSource`])
//! - **Per-market registry** with a fixed priority order
//! - **Failover coordinator** that walks the registry until one source answers
//! - **Source-local resilience**: circuit breaker, rate budget, transport retry
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Eastmoney, Sina, Tushare, Tencent and Yahoo sources |
//! | [`batch`] | Bounded concurrent fetches over many symbols |
//! | [`chip`] | Chip distribution estimated from daily turnover |
//! | [`circuit_breaker`] | Per-source circuit breaker |
//! | [`config`] | Fetch settings and credentials passed in by the caller |
//! | [`data_source`] | Source trait, requests and structured source errors |
//! | [`domain`] | Symbols, price records, quotes, chip distribution |
//! | [`error`] | Validation and configuration errors |
//! | [`failover`] | Ordered failover coordinator |
//! | [`http_client`] | HTTP client abstraction |
//! | [`market_mode`] | Market tag to source order and index set |
//! | [`registry`] | Per-market ordered source registry |
//! | [`retry`] | Transport retry and backoff |
//! | [`source_policy`] | Per-source quota, timeout and retry defaults |
//! | [`throttling`] | Rate budget |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stockpulse_core::{
//!     FailoverCoordinator, FetchSettings, HistoryRequest, MarketMode, ReqwestHttpClient,
//!     SourceCredentials, SourceRegistry, Symbol,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mode = MarketMode::select("cn")?;
//!     let settings = FetchSettings::default();
//!     let credentials = SourceCredentials::default().with_tushare_token("...");
//!     let registry =
//!         SourceRegistry::standard(&mode, &settings, &credentials, Arc::new(ReqwestHttpClient::new()))?;
//!     let coordinator = FailoverCoordinator::new(Arc::new(registry), settings.source_timeout);
//!
//!     let symbol = Symbol::parse("600519", mode.market)?;
//!     let history = coordinator
//!         .get_history(&HistoryRequest::trailing_days(symbol, 30))
//!         .await?;
//!     println!("{} rows from {}", history.data.len(), history.source);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Failover        │────▶│ Source Registry  │
//! │ Coordinator     │     │ (per market)     │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Data Source     │────▶│ Breaker / Budget │
//! │ (adapter)       │     │ / Retry / HTTP   │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Individual sources fail with a [`SourceError`]; callers only ever see
//! [`FailoverError`] (every source failed, with the ordered trail) or a
//! [`ConfigError`] raised while wiring the registry.

pub mod adapters;
pub mod batch;
pub mod chip;
pub mod circuit_breaker;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod failover;
pub mod http_client;
pub mod market_mode;
pub mod registry;
pub mod retry;
pub mod source;
pub mod source_policy;
pub mod throttling;

// Source implementations
pub use adapters::{EastmoneySource, SinaSource, TencentSource, TushareSource, YahooSource};

// Batch runs
pub use batch::{fetch_batch, BatchItem, BatchReport, BatchSummary};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Settings
pub use config::{FetchSettings, SourceCredentials};

// Data source trait and types
pub use data_source::{
    CapabilitySet, DataSource, Endpoint, HistoryRequest, SourceError, SourceErrorKind,
    SourceFuture, SourceProfile, SourceSymbol,
};

// Domain models
pub(crate) use domain::round2;
pub use domain::{
    ChipDistribution, ChipOutcome, CostBand, Exchange, Market, PriceHistory, PriceRecord, Quote,
    Symbol, TradeDate, UtcDateTime,
};

// Error types
pub use error::{ConfigError, ValidationError};

// Failover
pub use failover::{ChipFetch, FailoverCoordinator, FailoverError, FetchSuccess, SourceFailure};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpFuture, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};

// Market selection and registry
pub use market_mode::{MarketIndex, MarketMode};
pub use registry::{RegisteredSource, SourceDescriptor, SourceRegistry};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Source identifiers and policies
pub use source::SourceId;
pub use source_policy::SourcePolicy;

// Throttling
pub use throttling::RateBudget;
