use serde::Serialize;

use stockpulse_core::{MarketIndex, SourceDescriptor};

use crate::error::CliError;

use super::{CommandResult, Context};

#[derive(Debug, Serialize)]
struct SourceRow {
    #[serde(flatten)]
    descriptor: SourceDescriptor,
    endpoints: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct SourcesResponseData {
    sources: Vec<SourceRow>,
    indices: &'static [MarketIndex],
}

/// Lists the active registry without contacting any source.
pub fn run(context: &Context) -> Result<CommandResult, CliError> {
    let registry = context.coordinator.registry();
    let sources = registry
        .descriptors()
        .into_iter()
        .map(|descriptor| SourceRow {
            endpoints: descriptor.capabilities.supported_endpoints(),
            descriptor,
        })
        .collect::<Vec<_>>();
    let chain = sources.iter().map(|row| row.descriptor.id).collect();

    let data = serde_json::to_value(SourcesResponseData {
        sources,
        indices: context.settings.mode.indices,
    })?;

    let mut result = CommandResult::ok(data, chain);
    for disabled in &context.settings.fetch.disabled_sources {
        result = result.with_warning(format!("source '{disabled}' is disabled by settings"));
    }
    Ok(result)
}
