use serde::Serialize;
use serde_json::Value;
use stockpulse_core::{FailoverError, Market, SourceFailure, SourceId, UtcDateTime};
use uuid::Uuid;

use crate::error::CliError;

/// Response metadata shared by every command.
#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub request_id: Uuid,
    pub generated_at: String,
    pub market: Market,
    pub source_chain: Vec<SourceId>,
    pub latency_ms: u64,
    /// Source attempts that failed before an answer was found.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<SourceFailure>,
    pub warnings: Vec<String>,
}

/// Terminal failure for one requested symbol.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub code: &'static str,
    pub message: String,
    pub symbol: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<SourceFailure>,
}

impl ErrorEntry {
    pub fn from_failover(error: &FailoverError) -> Self {
        let (code, symbol) = match error {
            FailoverError::AllSourcesExhausted { symbol, .. } => ("failover.exhausted", symbol),
            FailoverError::MarketMismatch { symbol, .. } => ("failover.market_mismatch", symbol),
        };
        Self {
            code,
            message: error.to_string(),
            symbol: symbol.clone(),
            attempts: error.failures().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub meta: Meta,
    pub data: Value,
    pub errors: Vec<ErrorEntry>,
}

impl Envelope {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn render(envelope: &Envelope, pretty: bool) -> Result<(), CliError> {
    println!("{}", to_json(envelope, pretty)?);
    Ok(())
}

fn to_json(envelope: &Envelope, pretty: bool) -> Result<String, CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(envelope)?
    } else {
        serde_json::to_string(envelope)?
    };
    Ok(payload)
}

impl Meta {
    pub fn new(market: Market, source_chain: Vec<SourceId>, latency_ms: u64) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            generated_at: UtcDateTime::now().format_rfc3339(),
            market,
            source_chain,
            latency_ms,
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stockpulse_core::{Endpoint, SourceError};

    fn exhausted() -> FailoverError {
        FailoverError::AllSourcesExhausted {
            symbol: String::from("600519"),
            endpoint: Endpoint::Quote,
            failures: vec![
                SourceFailure::new(SourceId::Eastmoney, &SourceError::rate_limited("429")),
                SourceFailure::new(SourceId::Sina, &SourceError::unavailable("timeout")),
            ],
            latency_ms: 12,
        }
    }

    #[test]
    fn exhausted_error_keeps_ordered_attempts() {
        let entry = ErrorEntry::from_failover(&exhausted());

        assert_eq!(entry.code, "failover.exhausted");
        assert_eq!(entry.symbol, "600519");
        let sources: Vec<SourceId> = entry.attempts.iter().map(|a| a.source).collect();
        assert_eq!(sources, vec![SourceId::Eastmoney, SourceId::Sina]);
    }

    #[test]
    fn envelope_serializes_meta_data_and_errors() {
        let envelope = Envelope {
            meta: Meta::new(Market::Domestic, vec![SourceId::Eastmoney, SourceId::Sina], 12),
            data: json!({ "quotes": [] }),
            errors: vec![ErrorEntry::from_failover(&exhausted())],
        };

        let value: Value = serde_json::from_str(&to_json(&envelope, false).expect("serializes"))
            .expect("valid json");

        assert_eq!(value["meta"]["market"], json!("domestic"));
        assert_eq!(value["meta"]["source_chain"], json!(["eastmoney", "sina"]));
        assert!(value["meta"].get("failures").is_none());
        assert_eq!(value["errors"][0]["attempts"][0]["code"], json!("source.rate_limited"));
        assert!(!envelope.is_ok());
    }
}
