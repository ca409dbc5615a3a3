//! Concrete market data sources.
//!
//! | Source | Markets | Canonical form | Chip |
//! |--------|---------|----------------|------|
//! | [`EastmoneySource`] | cn | `1.600519` | estimated |
//! | [`SinaSource`] | cn | `sh600519` | no |
//! | [`TushareSource`] | cn | `600519.SH` | no |
//! | [`TencentSource`] | cn | `sh600519` | no |
//! | [`YahooSource`] | cn, us | `600519.SS` / `AAPL` | no |

mod eastmoney;
mod sina;
mod tencent;
mod transport;
mod tushare;
mod yahoo;

pub use eastmoney::EastmoneySource;
pub use sina::SinaSource;
pub use tencent::TencentSource;
pub use transport::SourceTransport;
pub use tushare::TushareSource;
pub use yahoo::YahooSource;

use serde_json::Value;

use crate::{Market, PriceHistory, TradeDate, UtcDateTime};

const DOMESTIC_ONLY: &[Market] = &[Market::Domestic];
const ALL_MARKETS: &[Market] = &[Market::Domestic, Market::International];

/// Domestic exchanges run on UTC+8.
const BEIJING_OFFSET_HOURS: i8 = 8;

/// Drops rows outside `[start, end]`; some upstreams ignore the requested
/// window or pad it.
fn within_range(history: PriceHistory, start: TradeDate, end: TradeDate) -> PriceHistory {
    let symbol = history.symbol.clone();
    let records = history
        .into_records()
        .into_iter()
        .filter(|record| record.date >= start && record.date <= end)
        .collect();
    PriceHistory::from_records(symbol, records)
}

/// Number from a JSON field that may arrive as a number or numeric text.
fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|v| v.is_finite()),
        Value::String(text) => transport::parse_number(text),
        _ => None,
    }
}

/// Parses `HH:MM:SS` (or `HHMMSS`) Beijing wall-clock time on `date`.
fn beijing_time(date: TradeDate, clock: &str) -> Option<UtcDateTime> {
    let digits: String = clock.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 6 {
        return None;
    }
    let hour = digits[0..2].parse().ok()?;
    let minute = digits[2..4].parse().ok()?;
    let second = digits[4..6].parse().ok()?;
    UtcDateTime::from_local(date.into_inner(), hour, minute, second, BEIJING_OFFSET_HOURS)
}

/// Close of the domestic session (15:00 Beijing) on `date`.
fn beijing_close(date: TradeDate) -> UtcDateTime {
    beijing_time(date, "150000").unwrap_or_else(UtcDateTime::now)
}
