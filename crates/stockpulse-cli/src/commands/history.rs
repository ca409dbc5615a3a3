use serde::Serialize;

use stockpulse_core::{HistoryRequest, PriceHistory, SourceId, TradeDate};

use crate::cli::HistoryArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

#[derive(Debug, Serialize)]
struct HistoryResponseData<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<SourceId>,
    history: Option<&'a PriceHistory>,
}

pub async fn run(args: &HistoryArgs, context: &Context) -> Result<CommandResult, CliError> {
    let symbol = context.parse_symbol(&args.symbol)?;
    let fetch = &context.settings.fetch;

    let end = match args.end.as_deref() {
        Some(raw) => TradeDate::parse(raw)?,
        None => TradeDate::today_utc(),
    };
    let start = match args.start.as_deref() {
        Some(raw) => TradeDate::parse(raw)?,
        None => end.minus_days(args.days.unwrap_or(fetch.history_days)),
    };
    let request = HistoryRequest::new(symbol, start, end)?.with_min_records(fetch.min_records);

    match context.coordinator.get_history(&request).await {
        Ok(success) => {
            let data = serde_json::to_value(HistoryResponseData {
                source: Some(success.source),
                history: Some(&success.data),
            })?;
            Ok(CommandResult::fetched(data, success))
        }
        Err(error) => {
            let data = serde_json::to_value(HistoryResponseData {
                source: None,
                history: None,
            })?;
            Ok(CommandResult::failed(data, &error))
        }
    }
}
