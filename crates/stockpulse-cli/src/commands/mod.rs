mod chip;
mod history;
mod quote;
mod run;
mod sources;

use std::sync::Arc;

use serde_json::Value;
use stockpulse_core::{
    FailoverCoordinator, FailoverError, FetchSuccess, Market, ReqwestHttpClient, SourceFailure,
    SourceId, SourceRegistry, Symbol,
};

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::{Envelope, ErrorEntry, Meta};
use crate::settings::Settings;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub failures: Vec<SourceFailure>,
    pub errors: Vec<ErrorEntry>,
    pub latency_ms: u64,
    pub source_chain: Vec<SourceId>,
}

impl CommandResult {
    pub fn ok(data: Value, source_chain: Vec<SourceId>) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            failures: Vec::new(),
            errors: Vec::new(),
            latency_ms: 0,
            source_chain,
        }
    }

    /// Result carrying the routing metadata of a successful fetch.
    pub fn fetched<T>(data: Value, success: FetchSuccess<T>) -> Self {
        Self {
            data,
            warnings: success.warnings,
            failures: success.failures,
            errors: Vec::new(),
            latency_ms: success.latency_ms,
            source_chain: success.source_chain,
        }
    }

    /// Result for a request every source failed; the chain lists the
    /// sources that were attempted.
    pub fn failed(data: Value, error: &FailoverError) -> Self {
        let latency_ms = match error {
            FailoverError::AllSourcesExhausted { latency_ms, .. } => *latency_ms,
            FailoverError::MarketMismatch { .. } => 0,
        };
        Self::ok(data, attempted(error))
            .with_latency(latency_ms)
            .with_errors(vec![ErrorEntry::from_failover(error)])
    }

    pub fn with_errors(mut self, errors: Vec<ErrorEntry>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

/// Everything a command needs: resolved settings and a coordinator bound to
/// the selected market.
pub struct Context {
    pub settings: Settings,
    pub coordinator: Arc<FailoverCoordinator>,
}

impl Context {
    pub fn new(settings: Settings) -> Result<Self, CliError> {
        let registry = SourceRegistry::standard(
            &settings.mode,
            &settings.fetch,
            &settings.credentials,
            Arc::new(ReqwestHttpClient::new()),
        )?;
        let coordinator =
            FailoverCoordinator::new(Arc::new(registry), settings.fetch.source_timeout);
        Ok(Self {
            settings,
            coordinator: Arc::new(coordinator),
        })
    }

    pub fn market(&self) -> Market {
        self.settings.mode.market
    }

    pub fn parse_symbol(&self, raw: &str) -> Result<Symbol, CliError> {
        Symbol::parse(raw, self.market()).map_err(CliError::from)
    }
}

pub async fn run(cli: &Cli, settings: Settings) -> Result<Envelope, CliError> {
    let context = Context::new(settings)?;
    execute(&cli.command, &context).await
}

pub async fn execute(command: &Command, context: &Context) -> Result<Envelope, CliError> {
    let result = match command {
        Command::History(args) => history::run(args, context).await?,
        Command::Quote(args) => quote::run(args, context).await?,
        Command::Chip(args) => chip::run(args, context).await?,
        Command::Sources => sources::run(context)?,
        Command::Run(args) => run::run(args, context).await?,
    };

    let CommandResult {
        data,
        warnings,
        failures,
        errors,
        latency_ms,
        source_chain,
    } = result;

    let mut meta = Meta::new(context.market(), source_chain, latency_ms);
    meta.failures = failures;
    meta.warnings = warnings;

    Ok(Envelope { meta, data, errors })
}

fn attempted(error: &FailoverError) -> Vec<SourceId> {
    error.failures().iter().map(|failure| failure.source).collect()
}

/// Merges per-symbol source chains without repeating a source.
fn merge_chain(chain: &mut Vec<SourceId>, more: &[SourceId]) {
    for id in more {
        if !chain.contains(id) {
            chain.push(*id);
        }
    }
}
