//! Bounded concurrent history fetches across many symbols.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::data_source::HistoryRequest;
use crate::failover::{elapsed_ms, FailoverCoordinator, FailoverError, FetchSuccess};
use crate::{PriceHistory, Symbol};

/// Result for one symbol of a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub symbol: Symbol,
    pub outcome: Result<FetchSuccess<PriceHistory>, FailoverError>,
}

/// All batch results, in the order the requests were given.
#[derive(Debug)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub items: Vec<BatchItem>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|item| item.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            run_id: self.run_id,
            total: self.items.len(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            elapsed_ms: self.elapsed_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

/// Fetches every request through `coordinator` with at most `concurrency`
/// symbols in flight. Each symbol still walks its sources sequentially.
pub async fn fetch_batch(
    coordinator: Arc<FailoverCoordinator>,
    requests: Vec<HistoryRequest>,
    concurrency: usize,
) -> BatchReport {
    let run_id = Uuid::new_v4();
    let started = Instant::now();
    let span = info_span!("batch", %run_id, symbols = requests.len(), concurrency);
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let total = requests.len();

    let mut tasks = JoinSet::new();
    for (index, request) in requests.into_iter().enumerate() {
        let coordinator = Arc::clone(&coordinator);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(
            async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = coordinator.get_history(&request).await;
                (
                    index,
                    BatchItem {
                        symbol: request.symbol,
                        outcome,
                    },
                )
            }
            .instrument(span.clone()),
        );
    }

    let mut slots: Vec<Option<BatchItem>> = (0..total).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, item)) => slots[index] = Some(item),
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(error) => {
                tracing::error!(parent: &span, error = %error, "batch task was cancelled");
            }
        }
    }

    let report = BatchReport {
        run_id,
        items: slots.into_iter().flatten().collect(),
        elapsed_ms: elapsed_ms(started),
    };
    span.in_scope(|| {
        info!(
            total,
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_ms = report.elapsed_ms,
            "batch finished"
        );
    });
    report
}
