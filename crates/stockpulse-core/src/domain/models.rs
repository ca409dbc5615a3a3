use serde::Serialize;

use crate::{Symbol, TradeDate, UtcDateTime, ValidationError};

/// One trading-day observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRecord {
    pub date: TradeDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Traded value in quote currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnover: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_close: Option<f64>,
    /// Close-to-close change in percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_pct: Option<f64>,
    /// Share of float traded that day, as a fraction in `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnover_rate: Option<f64>,
}

impl PriceRecord {
    pub fn new(
        date: TradeDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidPriceRange);
        }

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            turnover: None,
            adjusted_close: None,
            change_pct: None,
            turnover_rate: None,
        })
    }

    pub fn with_turnover(mut self, turnover: Option<f64>) -> Self {
        self.turnover = turnover.filter(|value| value.is_finite() && *value >= 0.0);
        self
    }

    pub fn with_adjusted_close(mut self, adjusted_close: Option<f64>) -> Self {
        self.adjusted_close = adjusted_close.filter(|value| value.is_finite() && *value >= 0.0);
        self
    }

    pub fn with_change_pct(mut self, change_pct: Option<f64>) -> Self {
        self.change_pct = change_pct.filter(|value| value.is_finite());
        self
    }

    pub fn with_turnover_rate(mut self, turnover_rate: Option<f64>) -> Self {
        self.turnover_rate = turnover_rate.filter(|value| (0.0..=1.0).contains(value));
        self
    }
}

/// Date-ordered daily history of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceHistory {
    pub symbol: Symbol,
    records: Vec<PriceRecord>,
}

impl PriceHistory {
    /// Sorts by date, keeps the last observation of a repeated date and fills
    /// the change/turnover columns a source left empty.
    pub fn from_records(symbol: Symbol, mut records: Vec<PriceRecord>) -> Self {
        records.sort_by_key(|record| record.date);

        let mut deduped: Vec<PriceRecord> = Vec::with_capacity(records.len());
        for record in records {
            match deduped.last_mut() {
                Some(last) if last.date == record.date => *last = record,
                _ => deduped.push(record),
            }
        }

        let mut previous_close: Option<f64> = None;
        for record in &mut deduped {
            if record.change_pct.is_none() {
                let change = match previous_close {
                    Some(prev) if prev > 0.0 => round2((record.close - prev) / prev * 100.0),
                    _ => 0.0,
                };
                record.change_pct = Some(change);
            }
            if record.turnover.is_none() {
                record.turnover = Some(record.volume as f64 * record.close);
            }
            previous_close = Some(record.close);
        }

        Self {
            symbol,
            records: deduped,
        }
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<PriceRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<TradeDate> {
        self.records.first().map(|record| record.date)
    }

    pub fn last_date(&self) -> Option<TradeDate> {
        self.records.last().map(|record| record.date)
    }

    pub fn latest(&self) -> Option<&PriceRecord> {
        self.records.last()
    }
}

/// Latest price snapshot. Not persisted beyond the current run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub symbol: Symbol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub price: f64,
    pub change: f64,
    pub change_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    pub as_of: UtcDateTime,
}

impl Quote {
    pub fn new(
        symbol: Symbol,
        price: f64,
        change: f64,
        change_pct: f64,
        as_of: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("price", price)?;
        validate_finite("change", change)?;
        validate_finite("change_pct", change_pct)?;

        Ok(Self {
            symbol,
            name: None,
            price,
            change,
            change_pct,
            open: None,
            high: None,
            low: None,
            prev_close: None,
            volume: None,
            as_of,
        })
    }

    /// Derives change and change-percent from the previous session close.
    pub fn from_previous_close(
        symbol: Symbol,
        price: f64,
        prev_close: f64,
        as_of: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("prev_close", prev_close)?;
        let change = price - prev_close;
        let change_pct = if prev_close > 0.0 {
            round2(change / prev_close * 100.0)
        } else {
            0.0
        };
        let mut quote = Self::new(symbol, price, change, change_pct, as_of)?;
        quote.prev_close = Some(prev_close);
        Ok(quote)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = (!name.trim().is_empty()).then(|| name.trim().to_owned());
        self
    }

    pub fn with_session(
        mut self,
        open: Option<f64>,
        high: Option<f64>,
        low: Option<f64>,
        volume: Option<u64>,
    ) -> Self {
        let positive = |value: Option<f64>| value.filter(|v| v.is_finite() && *v > 0.0);
        self.open = positive(open);
        self.high = positive(high);
        self.low = positive(low);
        self.volume = volume;
        self
    }
}

/// Cost band holding a given share of all chips.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBand {
    pub low: f64,
    pub high: f64,
    /// `(high - low) / (high + low)`; smaller means more concentrated.
    pub concentration: f64,
}

impl CostBand {
    pub fn new(low: f64, high: f64) -> Result<Self, ValidationError> {
        validate_non_negative("cost_low", low)?;
        validate_non_negative("cost_high", high)?;
        if high < low {
            return Err(ValidationError::InvalidPriceRange);
        }
        let concentration = if high + low > 0.0 {
            (high - low) / (high + low)
        } else {
            0.0
        };
        Ok(Self {
            low,
            high,
            concentration,
        })
    }
}

/// Cost-basis distribution of a domestic symbol at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChipDistribution {
    pub symbol: Symbol,
    pub date: TradeDate,
    /// Share of chips currently in profit, in `[0, 1]`.
    pub profit_ratio: f64,
    pub avg_cost: f64,
    pub cost_90: CostBand,
    pub cost_70: CostBand,
}

impl ChipDistribution {
    pub fn new(
        symbol: Symbol,
        date: TradeDate,
        profit_ratio: f64,
        avg_cost: f64,
        cost_90: CostBand,
        cost_70: CostBand,
    ) -> Result<Self, ValidationError> {
        validate_finite("profit_ratio", profit_ratio)?;
        if !(0.0..=1.0).contains(&profit_ratio) {
            return Err(ValidationError::RatioOutOfRange {
                field: "profit_ratio",
            });
        }
        validate_non_negative("avg_cost", avg_cost)?;

        Ok(Self {
            symbol,
            date,
            profit_ratio,
            avg_cost,
            cost_90,
            cost_70,
        })
    }
}

/// Result of a chip-distribution request that did not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum ChipOutcome {
    Available(ChipDistribution),
    /// The market or source has no notion of chip distribution.
    NotApplicable,
}

impl ChipOutcome {
    pub fn is_applicable(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Ok(())
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    validate_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
