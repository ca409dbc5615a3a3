use std::time::Instant;

use serde::Serialize;

use stockpulse_core::Quote;

use crate::cli::QuoteArgs;
use crate::error::CliError;
use crate::output::ErrorEntry;

use super::{merge_chain, CommandResult, Context};

#[derive(Debug, Serialize)]
struct QuoteResponseData {
    quotes: Vec<Quote>,
}

/// Quotes are fetched one symbol at a time; a symbol every source fails on
/// is reported in `errors` without hiding the others.
pub async fn run(args: &QuoteArgs, context: &Context) -> Result<CommandResult, CliError> {
    let symbols = args
        .symbols
        .iter()
        .map(|raw| context.parse_symbol(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let started = Instant::now();
    let mut quotes = Vec::with_capacity(symbols.len());
    let mut chain = Vec::new();
    let mut failures = Vec::new();
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    for symbol in &symbols {
        match context.coordinator.get_quote(symbol).await {
            Ok(success) => {
                merge_chain(&mut chain, &success.source_chain);
                failures.extend(success.failures);
                warnings.extend(success.warnings);
                quotes.push(success.data);
            }
            Err(error) => {
                merge_chain(&mut chain, &super::attempted(&error));
                errors.push(ErrorEntry::from_failover(&error));
            }
        }
    }

    let data = serde_json::to_value(QuoteResponseData { quotes })?;
    let mut result = CommandResult::ok(data, chain)
        .with_errors(errors)
        .with_latency(elapsed_ms(started));
    result.failures = failures;
    result.warnings = warnings;
    Ok(result)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
