//! Cost-basis (chip) distribution estimated from daily bars.
//!
//! Each day, existing chips decay by the day's turnover rate and the traded
//! share is redeposited across the day's range as a triangle peaking at the
//! average price. The resulting histogram yields the profit ratio, average
//! cost and the 90%/70% cost bands.

use crate::{round2, ChipDistribution, CostBand, PriceRecord, Symbol, ValidationError};

/// Bars considered by the estimator.
pub const LOOKBACK_DAYS: usize = 120;
/// Price grid resolution.
pub const PRICE_BUCKETS: usize = 150;

/// Estimates the chip distribution as of the last record.
///
/// Returns `Ok(None)` when the window carries no turnover rate at all, since
/// nothing can be said about holder cost without it.
pub fn estimate(
    symbol: &Symbol,
    records: &[PriceRecord],
) -> Result<Option<ChipDistribution>, ValidationError> {
    let window = &records[records.len().saturating_sub(LOOKBACK_DAYS)..];
    let Some(last) = window.last() else {
        return Ok(None);
    };
    if window.iter().all(|record| record.turnover_rate.is_none()) {
        return Ok(None);
    }

    let floor = window.iter().map(|r| r.low).fold(f64::INFINITY, f64::min);
    let ceiling = window.iter().map(|r| r.high).fold(f64::NEG_INFINITY, f64::max);
    let grid = PriceGrid::new(floor, ceiling);

    let mut chips = vec![0.0_f64; grid.len()];
    let mut seeded = false;
    for record in window {
        let Some(rate) = record.turnover_rate else {
            continue;
        };
        // The first observed day seeds the whole float.
        let rate = if seeded { rate } else { 1.0 };
        seeded = true;

        for chip in chips.iter_mut() {
            *chip *= 1.0 - rate;
        }
        deposit(&grid, &mut chips, record, rate);
    }

    let total: f64 = chips.iter().sum();
    if total <= 0.0 {
        return Ok(None);
    }

    let close = last.close;
    let in_profit: f64 = grid
        .prices()
        .zip(&chips)
        .filter(|(price, _)| *price <= close)
        .map(|(_, chip)| chip)
        .sum();
    let weighted: f64 = grid.prices().zip(&chips).map(|(price, chip)| price * chip).sum();

    let percentile = |q: f64| grid.percentile(&chips, total, q);
    let cost_90 = CostBand::new(round2(percentile(0.05)), round2(percentile(0.95)))?;
    let cost_70 = CostBand::new(round2(percentile(0.15)), round2(percentile(0.85)))?;

    let profit_ratio = ((in_profit / total) * 10_000.0).round() / 10_000.0;
    ChipDistribution::new(
        symbol.clone(),
        last.date,
        profit_ratio.clamp(0.0, 1.0),
        round2(weighted / total),
        cost_90,
        cost_70,
    )
    .map(Some)
}

fn deposit(grid: &PriceGrid, chips: &mut [f64], record: &PriceRecord, amount: f64) {
    let low = record.low;
    let high = record.high;
    let peak = ((record.open + record.high + record.low + record.close) / 4.0).clamp(low, high);

    let weights: Vec<f64> = grid
        .prices()
        .map(|price| triangle(price, low, peak, high))
        .collect();
    let sum: f64 = weights.iter().sum();

    if sum > 0.0 {
        for (chip, weight) in chips.iter_mut().zip(weights) {
            *chip += amount * weight / sum;
        }
    } else {
        // Range narrower than one bucket.
        chips[grid.nearest(peak)] += amount;
    }
}

fn triangle(price: f64, low: f64, peak: f64, high: f64) -> f64 {
    if price < low || price > high {
        return 0.0;
    }
    if price <= peak {
        if peak > low {
            (price - low) / (peak - low)
        } else {
            1.0
        }
    } else if high > peak {
        (high - price) / (high - peak)
    } else {
        1.0
    }
}

struct PriceGrid {
    floor: f64,
    step: f64,
    buckets: usize,
}

impl PriceGrid {
    fn new(floor: f64, ceiling: f64) -> Self {
        if ceiling > floor {
            Self {
                floor,
                step: (ceiling - floor) / (PRICE_BUCKETS - 1) as f64,
                buckets: PRICE_BUCKETS,
            }
        } else {
            Self {
                floor,
                step: 0.0,
                buckets: 1,
            }
        }
    }

    fn len(&self) -> usize {
        self.buckets
    }

    fn price(&self, index: usize) -> f64 {
        self.floor + self.step * index as f64
    }

    fn prices(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.buckets).map(|index| self.price(index))
    }

    fn nearest(&self, price: f64) -> usize {
        if self.step <= 0.0 {
            return 0;
        }
        let index = ((price - self.floor) / self.step).round();
        (index.max(0.0) as usize).min(self.buckets - 1)
    }

    fn percentile(&self, chips: &[f64], total: f64, q: f64) -> f64 {
        let target = total * q;
        let mut cumulative = 0.0;
        for (index, chip) in chips.iter().enumerate() {
            cumulative += chip;
            if cumulative >= target {
                return self.price(index);
            }
        }
        self.price(self.buckets - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Market, TradeDate};

    fn symbol() -> Symbol {
        Symbol::parse("600519", Market::Domestic).expect("valid symbol")
    }

    fn bar(day: u32, price: f64, spread: f64, rate: Option<f64>) -> PriceRecord {
        let date = TradeDate::parse("2024-01-01").expect("date").plus_days(day);
        PriceRecord::new(date, price, price + spread, price - spread, price, 1_000)
            .expect("valid bar")
            .with_turnover_rate(rate)
    }

    #[test]
    fn flat_market_concentrates_all_chips_at_one_price() {
        let records: Vec<_> = (0..30).map(|day| bar(day, 10.0, 0.0, Some(0.05))).collect();

        let chip = estimate(&symbol(), &records)
            .expect("valid")
            .expect("turnover present");

        assert_eq!(chip.profit_ratio, 1.0);
        assert_eq!(chip.avg_cost, 10.0);
        assert_eq!(chip.cost_90.low, 10.0);
        assert_eq!(chip.cost_90.high, 10.0);
        assert_eq!(chip.cost_70.concentration, 0.0);
        assert_eq!(chip.date, records[29].date);
    }

    #[test]
    fn heavy_recent_turnover_moves_cost_towards_recent_prices() {
        let mut records: Vec<_> = (0..60).map(|day| bar(day, 10.0, 0.2, Some(0.02))).collect();
        records.extend((60..120).map(|day| bar(day, 20.0, 0.2, Some(0.3))));

        let chip = estimate(&symbol(), &records)
            .expect("valid")
            .expect("turnover present");

        assert!(chip.avg_cost > 19.0, "avg cost {}", chip.avg_cost);
        assert!(chip.profit_ratio > 0.4);
        assert!(chip.cost_90.low <= chip.cost_70.low);
        assert!(chip.cost_90.high >= chip.cost_70.high);
    }

    #[test]
    fn price_drop_leaves_holders_under_water() {
        let mut records: Vec<_> = (0..100).map(|day| bar(day, 30.0, 0.5, Some(0.05))).collect();
        records.push(bar(100, 20.0, 0.5, Some(0.01)));

        let chip = estimate(&symbol(), &records)
            .expect("valid")
            .expect("turnover present");

        assert!(chip.profit_ratio < 0.05, "profit {}", chip.profit_ratio);
        assert!(chip.avg_cost > 29.0);
    }

    #[test]
    fn missing_turnover_rate_yields_nothing() {
        let records: Vec<_> = (0..10).map(|day| bar(day, 10.0, 0.5, None)).collect();
        assert_eq!(estimate(&symbol(), &records), Ok(None));
        assert_eq!(estimate(&symbol(), &[]), Ok(None));
    }
}
