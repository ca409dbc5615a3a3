use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data_source::{
    DataSource, Endpoint, HistoryRequest, SourceError, SourceErrorKind, SourceFuture, SourceSymbol,
};
use crate::registry::SourceRegistry;
use crate::{ChipDistribution, ChipOutcome, Market, PriceHistory, Quote, SourceId, Symbol};

/// One failed attempt in the failover trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: SourceId,
    pub kind: SourceErrorKind,
    pub code: &'static str,
    pub message: String,
}

impl SourceFailure {
    pub fn new(source: SourceId, error: &SourceError) -> Self {
        Self {
            source,
            kind: error.kind(),
            code: error.code(),
            message: error.message().to_owned(),
        }
    }
}

/// Successful fetch, tagged with the source that answered.
#[derive(Debug, Clone, Serialize)]
pub struct FetchSuccess<T> {
    pub data: T,
    pub source: SourceId,
    /// Every source attempted, in order, ending with `source`.
    pub source_chain: Vec<SourceId>,
    /// Failures recorded before `source` answered.
    pub failures: Vec<SourceFailure>,
    pub warnings: Vec<String>,
    pub latency_ms: u64,
}

/// Outcome of a chip-distribution request that did not exhaust its sources.
#[derive(Debug, Clone)]
pub enum ChipFetch {
    Available(FetchSuccess<ChipDistribution>),
    NotApplicable,
}

impl ChipFetch {
    pub fn is_applicable(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

/// Terminal coordinator failure.
#[derive(Debug, Clone, Error)]
pub enum FailoverError {
    #[error("all {} source(s) failed {endpoint} for '{symbol}'", .failures.len())]
    AllSourcesExhausted {
        symbol: String,
        endpoint: Endpoint,
        failures: Vec<SourceFailure>,
        latency_ms: u64,
    },
    #[error("symbol '{symbol}' belongs to the {symbol_market} market, registry serves {registry_market}")]
    MarketMismatch {
        symbol: String,
        symbol_market: Market,
        registry_market: Market,
    },
}

impl FailoverError {
    /// Ordered per-source reasons; empty for a market mismatch.
    pub fn failures(&self) -> &[SourceFailure] {
        match self {
            Self::AllSourcesExhausted { failures, .. } => failures,
            Self::MarketMismatch { .. } => &[],
        }
    }
}

/// Tries the registry's sources in rank order until one returns usable data.
///
/// Source attempts for one request are strictly sequential and never
/// retried here; retries live in each source's transport.
pub struct FailoverCoordinator {
    registry: Arc<SourceRegistry>,
    call_timeout: Duration,
}

impl FailoverCoordinator {
    pub fn new(registry: Arc<SourceRegistry>, call_timeout: Duration) -> Self {
        Self {
            registry,
            call_timeout,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn market(&self) -> Market {
        self.registry.market()
    }

    pub async fn get_history(
        &self,
        request: &HistoryRequest,
    ) -> Result<FetchSuccess<PriceHistory>, FailoverError> {
        let (start, end, min_records) = (request.start, request.end, request.min_records);
        self.route(
            Endpoint::History,
            &request.symbol,
            move |source, target| source.fetch_history(target, start, end),
            move |history| check_history(history, min_records),
        )
        .await
    }

    pub async fn get_quote(&self, symbol: &Symbol) -> Result<FetchSuccess<Quote>, FailoverError> {
        self.route(
            Endpoint::Quote,
            symbol,
            |source, target| source.fetch_quote(target),
            |_| Ok(()),
        )
        .await
    }

    /// Short-circuits to `NotApplicable` without any call when no active
    /// source declares chip support. A source answering `NotApplicable`
    /// ends the search the same way.
    pub async fn get_chip_distribution(&self, symbol: &Symbol) -> Result<ChipFetch, FailoverError> {
        self.ensure_market(symbol)?;
        if !self.registry.supports(Endpoint::ChipDistribution) {
            debug!(symbol = %symbol, market = %self.market(), "no chip-capable source; not applicable");
            return Ok(ChipFetch::NotApplicable);
        }

        let routed = self
            .route(
                Endpoint::ChipDistribution,
                symbol,
                |source, target| source.fetch_chip_distribution(target),
                |_| Ok(()),
            )
            .await?;

        let ChipOutcome::Available(distribution) = routed.data else {
            return Ok(ChipFetch::NotApplicable);
        };
        Ok(ChipFetch::Available(FetchSuccess {
            data: distribution,
            source: routed.source,
            source_chain: routed.source_chain,
            failures: routed.failures,
            warnings: routed.warnings,
            latency_ms: routed.latency_ms,
        }))
    }

    fn ensure_market(&self, symbol: &Symbol) -> Result<(), FailoverError> {
        if symbol.market() == self.market() {
            return Ok(());
        }
        Err(FailoverError::MarketMismatch {
            symbol: symbol.to_string(),
            symbol_market: symbol.market(),
            registry_market: self.market(),
        })
    }

    async fn route<T, F, A>(
        &self,
        endpoint: Endpoint,
        symbol: &Symbol,
        mut invoke: F,
        mut accept: A,
    ) -> Result<FetchSuccess<T>, FailoverError>
    where
        F: for<'a> FnMut(&'a dyn DataSource, &'a SourceSymbol) -> SourceFuture<'a, T>,
        A: FnMut(&T) -> Result<(), SourceError>,
    {
        self.ensure_market(symbol)?;
        let started = Instant::now();
        let mut source_chain = Vec::with_capacity(self.registry.len());
        let mut failures = Vec::new();

        for entry in self.registry.entries() {
            let descriptor = entry.descriptor();
            if !descriptor.capabilities.supports(endpoint) {
                debug!(source = %descriptor.id, %endpoint, "source does not support endpoint; skipped");
                continue;
            }

            let source = entry.source();
            let target = SourceSymbol::for_source(source.as_ref(), symbol.clone());
            source_chain.push(descriptor.id);
            debug!(
                source = %descriptor.id,
                rank = descriptor.rank,
                symbol = %symbol,
                canonical = %target.canonical,
                %endpoint,
                "attempting source"
            );

            let outcome = match tokio::time::timeout(
                self.call_timeout,
                invoke(source.as_ref(), &target),
            )
            .await
            {
                Ok(Ok(data)) => accept(&data).map(|()| data),
                Ok(Err(error)) => Err(error),
                Err(_) => Err(SourceError::unavailable(format!(
                    "timed out after {} ms",
                    self.call_timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(data) => {
                    let mut warnings = Vec::new();
                    if !failures.is_empty() {
                        warnings.push(format!(
                            "source fallback succeeded with '{}' after {} failed attempt(s)",
                            descriptor.id,
                            failures.len()
                        ));
                    }
                    let latency_ms = elapsed_ms(started);
                    info!(
                        source = %descriptor.id,
                        symbol = %symbol,
                        %endpoint,
                        failed_attempts = failures.len(),
                        latency_ms,
                        "source answered"
                    );
                    return Ok(FetchSuccess {
                        data,
                        source: descriptor.id,
                        source_chain,
                        failures,
                        warnings,
                        latency_ms,
                    });
                }
                Err(error) => {
                    warn!(
                        source = %descriptor.id,
                        symbol = %symbol,
                        %endpoint,
                        code = error.code(),
                        error = error.message(),
                        "source failed; advancing"
                    );
                    failures.push(SourceFailure::new(descriptor.id, &error));
                }
            }
        }

        let latency_ms = elapsed_ms(started);
        warn!(
            symbol = %symbol,
            %endpoint,
            attempts = failures.len(),
            latency_ms,
            "all sources exhausted"
        );
        Err(FailoverError::AllSourcesExhausted {
            symbol: symbol.to_string(),
            endpoint,
            failures,
            latency_ms,
        })
    }
}

/// Empty or short histories count as failures so the next source is tried.
fn check_history(history: &PriceHistory, min_records: usize) -> Result<(), SourceError> {
    if history.is_empty() {
        return Err(SourceError::symbol_not_found("empty price history"));
    }
    if history.len() < min_records {
        return Err(SourceError::unavailable(format!(
            "partial range: {} of at least {min_records} records",
            history.len()
        )));
    }
    Ok(())
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PriceRecord, TradeDate};

    fn history(days: u32) -> PriceHistory {
        let symbol = Symbol::parse("600519", Market::Domestic).expect("valid symbol");
        let first = TradeDate::parse("2024-01-01").expect("date");
        let records = (0..days)
            .map(|day| {
                PriceRecord::new(first.plus_days(day), 10.0, 11.0, 9.0, 10.5, 1_000)
                    .expect("valid record")
            })
            .collect();
        PriceHistory::from_records(symbol, records)
    }

    #[test]
    fn empty_history_is_symbol_not_found() {
        let error = check_history(&history(0), 1).expect_err("empty");
        assert_eq!(error.kind(), SourceErrorKind::SymbolNotFound);
        assert_eq!(error.message(), "empty price history");
    }

    #[test]
    fn short_history_is_partial_range() {
        let error = check_history(&history(3), 5).expect_err("short");
        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        assert!(error.message().starts_with("partial range"));
        assert!(check_history(&history(5), 5).is_ok());
    }

    #[test]
    fn exhausted_error_lists_failures_in_order() {
        let failures = vec![
            SourceFailure::new(SourceId::Eastmoney, &SourceError::rate_limited("busy")),
            SourceFailure::new(SourceId::Sina, &SourceError::unavailable("down")),
        ];
        let error = FailoverError::AllSourcesExhausted {
            symbol: String::from("600519"),
            endpoint: Endpoint::Quote,
            failures,
            latency_ms: 4,
        };

        assert_eq!(error.to_string(), "all 2 source(s) failed quote for '600519'");
        let sources: Vec<SourceId> = error.failures().iter().map(|f| f.source).collect();
        assert_eq!(sources, vec![SourceId::Eastmoney, SourceId::Sina]);
        assert_eq!(error.failures()[0].code, "source.rate_limited");
    }
}
