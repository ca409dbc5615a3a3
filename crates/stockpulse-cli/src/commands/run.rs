use serde::Serialize;
use tracing::info;

use stockpulse_core::{fetch_batch, BatchSummary, HistoryRequest, SourceId, TradeDate};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::ErrorEntry;

use super::{merge_chain, CommandResult, Context};

#[derive(Debug, Serialize)]
struct SymbolResult {
    symbol: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<SourceId>,
    records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_date: Option<TradeDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_close: Option<f64>,
}

#[derive(Debug, Serialize)]
struct RunResponseData {
    summary: BatchSummary,
    results: Vec<SymbolResult>,
}

pub async fn run(args: &RunArgs, context: &Context) -> Result<CommandResult, CliError> {
    let raw_symbols = if args.symbols.is_empty() {
        &context.settings.stock_list
    } else {
        &args.symbols
    };
    if raw_symbols.is_empty() {
        return Err(CliError::EmptyStockList);
    }

    let fetch = &context.settings.fetch;
    let days = args.days.unwrap_or(fetch.history_days);
    let requests = raw_symbols
        .iter()
        .map(|raw| {
            context.parse_symbol(raw).map(|symbol| {
                HistoryRequest::trailing_days(symbol, days).with_min_records(fetch.min_records)
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let report = fetch_batch(context.coordinator.clone(), requests, fetch.concurrency).await;
    let summary = report.summary();
    info!(
        run_id = %summary.run_id,
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        elapsed_ms = summary.elapsed_ms,
        "stock list run finished"
    );

    let mut chain = Vec::new();
    let mut failures = Vec::new();
    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    let mut results = Vec::with_capacity(report.items.len());

    for item in report.items {
        let symbol = item.symbol.code().to_owned();
        match item.outcome {
            Ok(success) => {
                merge_chain(&mut chain, &success.source_chain);
                let latest = success.data.latest();
                results.push(SymbolResult {
                    symbol,
                    ok: true,
                    source: Some(success.source),
                    records: success.data.len(),
                    last_date: latest.map(|record| record.date),
                    last_close: latest.map(|record| record.close),
                });
                failures.extend(success.failures);
                warnings.extend(
                    success
                        .warnings
                        .into_iter()
                        .map(|warning| format!("{}: {warning}", item.symbol.code())),
                );
            }
            Err(error) => {
                merge_chain(&mut chain, &super::attempted(&error));
                errors.push(ErrorEntry::from_failover(&error));
                results.push(SymbolResult {
                    symbol,
                    ok: false,
                    source: None,
                    records: 0,
                    last_date: None,
                    last_close: None,
                });
            }
        }
    }

    let latency_ms = summary.elapsed_ms;
    let data = serde_json::to_value(RunResponseData { summary, results })?;
    let mut result = CommandResult::ok(data, chain)
        .with_errors(errors)
        .with_latency(latency_ms);
    result.failures = failures;
    result.warnings = warnings;
    Ok(result)
}
