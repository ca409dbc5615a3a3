//! # Domain Models
//!
//! Normalized market data shapes shared by every source.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Market-aware validated symbol |
//! | [`Market`] / [`Exchange`] | Equity universe and domestic venue |
//! | [`PriceRecord`] / [`PriceHistory`] | Daily OHLCV rows, date-sorted |
//! | [`Quote`] | Latest price snapshot |
//! | [`ChipDistribution`] | Cost-basis distribution (domestic only) |
//! | [`TradeDate`] / [`UtcDateTime`] | Session date and UTC timestamp |
//!
//! All constructors validate their invariants; sources never hand out a
//! value that failed validation.

mod market;
mod models;
mod symbol;
mod timestamp;

pub use market::{Exchange, Market};
pub(crate) use models::round2;
pub use models::{ChipDistribution, ChipOutcome, CostBand, PriceHistory, PriceRecord, Quote};
pub use symbol::Symbol;
pub use timestamp::{TradeDate, UtcDateTime};
