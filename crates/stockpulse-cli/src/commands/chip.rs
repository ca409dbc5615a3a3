use serde::Serialize;

use stockpulse_core::{ChipDistribution, ChipFetch, SourceId};

use crate::cli::ChipArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum ChipStatus {
    Available,
    NotApplicable,
    Failed,
}

#[derive(Debug, Serialize)]
struct ChipResponseData<'a> {
    symbol: &'a str,
    status: ChipStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<SourceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chip: Option<&'a ChipDistribution>,
}

pub async fn run(args: &ChipArgs, context: &Context) -> Result<CommandResult, CliError> {
    let symbol = context.parse_symbol(&args.symbol)?;

    match context.coordinator.get_chip_distribution(&symbol).await {
        Ok(ChipFetch::Available(success)) => {
            let data = serde_json::to_value(ChipResponseData {
                symbol: symbol.code(),
                status: ChipStatus::Available,
                source: Some(success.source),
                chip: Some(&success.data),
            })?;
            Ok(CommandResult::fetched(data, success))
        }
        Ok(ChipFetch::NotApplicable) => {
            let data = serde_json::to_value(ChipResponseData {
                symbol: symbol.code(),
                status: ChipStatus::NotApplicable,
                source: None,
                chip: None,
            })?;
            Ok(CommandResult::ok(data, Vec::new()))
        }
        Err(error) => {
            let data = serde_json::to_value(ChipResponseData {
                symbol: symbol.code(),
                status: ChipStatus::Failed,
                source: None,
                chip: None,
            })?;
            Ok(CommandResult::failed(data, &error))
        }
    }
}
