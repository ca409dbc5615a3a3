use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::data_source::SourceError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::source_policy::SourcePolicy;
use crate::throttling::RateBudget;
use crate::SourceId;

/// HTTP plumbing shared by every source: rate budget, circuit breaker,
/// transport retry and status classification.
pub struct SourceTransport {
    policy: SourcePolicy,
    http: Arc<dyn HttpClient>,
    breaker: CircuitBreaker,
    budget: RateBudget,
}

impl SourceTransport {
    pub fn new(policy: SourcePolicy, http: Arc<dyn HttpClient>) -> Self {
        Self {
            breaker: CircuitBreaker::new(policy.source_id, policy.breaker),
            budget: RateBudget::from_policy(&policy),
            http,
            policy,
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.policy.source_id
    }

    pub fn policy(&self) -> &SourcePolicy {
        &self.policy
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Sends a request and returns the body of a 2xx response.
    pub async fn send(&self, request: HttpRequest) -> Result<String, SourceError> {
        let source = self.source_id();

        if !self.breaker.allow_request() {
            return Err(SourceError::unavailable(format!(
                "{source} circuit breaker is open; skipping upstream call"
            )));
        }

        if let Err(wait) = self.budget.try_acquire() {
            return Err(SourceError::rate_limited(format!(
                "{source} request budget exhausted; next slot in {}ms",
                wait.as_millis()
            )));
        }

        let request =
            request.with_timeout_ms(self.policy.request_timeout.as_millis() as u64);
        let retries = self.policy.retry.retries();
        let mut attempt = 0_u32;
        let mut in_flight = InFlight::arm(&self.breaker);

        loop {
            debug!(%source, url = %request.url, attempt, "sending request");
            let outcome = self.http.execute(request.clone()).await;

            let retry_reason = match &outcome {
                Err(error) if self.policy.retry.should_retry_error(error) => {
                    Some(error.message().to_owned())
                }
                Ok(response) if self.policy.retry.should_retry_status(response.status) => {
                    Some(format!("status {}", response.status))
                }
                _ => None,
            };

            if let Some(reason) = retry_reason {
                if attempt < retries {
                    let delay = self.policy.retry.delay_for_attempt(attempt);
                    warn!(
                        %source,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "retrying upstream request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
            }

            in_flight.settle();
            return match outcome {
                Ok(response) => self.classify(response),
                Err(error) => {
                    self.breaker.record_failure();
                    Err(SourceError::unavailable(format!(
                        "{source} transport error: {}",
                        error.message()
                    )))
                }
            };
        }
    }

    /// Sends a request and decodes the JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, SourceError> {
        let body = self.send(request).await?;
        parse_json(self.source_id(), &body)
    }

    fn classify(&self, response: HttpResponse) -> Result<String, SourceError> {
        let source = self.source_id();
        match response.status {
            status if (200..300).contains(&status) => {
                self.breaker.record_success();
                Ok(response.body)
            }
            404 => {
                // The upstream answered; only the symbol is unknown.
                self.breaker.record_success();
                Err(SourceError::symbol_not_found(format!(
                    "{source} returned status 404"
                )))
            }
            429 => Err(SourceError::rate_limited(format!(
                "{source} returned status 429"
            ))),
            401 | 403 => {
                self.breaker.record_failure();
                Err(SourceError::unavailable(format!(
                    "{source} rejected credentials (status {})",
                    response.status
                )))
            }
            status => {
                self.breaker.record_failure();
                Err(SourceError::unavailable(format!(
                    "{source} returned status {status}"
                )))
            }
        }
    }
}


/// Counts a request as a breaker failure when its future is dropped before
/// the upstream settles, as happens when the caller's time budget runs out.
struct InFlight<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn arm(breaker: &'a CircuitBreaker) -> Self {
        Self {
            breaker,
            settled: false,
        }
    }

    fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record_failure();
        }
    }
}

pub fn parse_json<T: DeserializeOwned>(source: SourceId, body: &str) -> Result<T, SourceError> {
    serde_json::from_str(body)
        .map_err(|e| SourceError::unavailable(format!("failed to parse {source} response: {e}")))
}

/// Parses a numeric field that upstreams send as text, treating blanks and
/// dashes as missing.
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::testing::ScriptedHttpClient;
    use crate::http_client::HttpError;
    use crate::retry::RetryConfig;
    use std::time::Duration;

    fn transport(client: Arc<ScriptedHttpClient>, retry: RetryConfig) -> SourceTransport {
        let policy = SourcePolicy::default_for(SourceId::Sina).with_retry(retry);
        SourceTransport::new(policy, client)
    }

    #[tokio::test]
    async fn retries_transient_status_then_succeeds() {
        let client = Arc::new(ScriptedHttpClient::new(vec![
            Ok(HttpResponse::new(503, "busy")),
            Ok(HttpResponse::ok("payload")),
        ]));
        let transport = transport(
            Arc::clone(&client),
            RetryConfig::fixed(Duration::from_millis(1), 2),
        );

        let body = transport
            .send(HttpRequest::get("https://example.test"))
            .await
            .expect("second attempt succeeds");

        assert_eq!(body, "payload");
        assert_eq!(client.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn maps_statuses_to_source_error_kinds() {
        let cases = [
            (404, SourceErrorKind::SymbolNotFound),
            (429, SourceErrorKind::RateLimited),
            (401, SourceErrorKind::Unavailable),
            (418, SourceErrorKind::Unavailable),
        ];
        for (status, kind) in cases {
            let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::new(status, ""))]));
            let transport = transport(client, RetryConfig::no_retry());
            let error = transport
                .send(HttpRequest::get("https://example.test"))
                .await
                .expect_err("non-2xx fails");
            assert_eq!(error.kind(), kind, "status {status}");
        }
    }

    #[tokio::test]
    async fn open_breaker_skips_network() {
        let client = Arc::new(ScriptedHttpClient::new(vec![
            Err(HttpError::timeout("t1")),
            Err(HttpError::timeout("t2")),
            Err(HttpError::timeout("t3")),
        ]));
        let transport = transport(Arc::clone(&client), RetryConfig::no_retry());

        for _ in 0..3 {
            let error = transport
                .send(HttpRequest::get("https://example.test"))
                .await
                .expect_err("timeouts fail");
            assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        }
        assert_eq!(transport.circuit_state(), CircuitState::Open);

        let error = transport
            .send(HttpRequest::get("https://example.test"))
            .await
            .expect_err("breaker open");
        assert!(error.message().contains("circuit breaker is open"));
        assert_eq!(client.recorded_requests().len(), 3);
    }

    /// Never answers; counts how many requests reached it.
    struct HangingClient {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl HttpClient for HangingClient {
        fn execute<'a>(&'a self, _request: HttpRequest) -> crate::http_client::HttpFuture<'a> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test]
    async fn abandoned_requests_count_as_breaker_failures() {
        let client = Arc::new(HangingClient {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let policy = SourcePolicy::default_for(SourceId::Sina).with_retry(RetryConfig::no_retry());
        let transport = SourceTransport::new(policy, Arc::clone(&client) as Arc<dyn HttpClient>);

        for _ in 0..3 {
            let abandoned = tokio::time::timeout(
                Duration::from_millis(10),
                transport.send(HttpRequest::get("https://example.test")),
            )
            .await;
            assert!(abandoned.is_err(), "hanging request should time out");
        }

        assert_eq!(transport.circuit_state(), CircuitState::Open);
        let error = transport
            .send(HttpRequest::get("https://example.test"))
            .await
            .expect_err("breaker open");
        assert!(error.message().contains("circuit breaker is open"));
        assert_eq!(client.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limited_answer_leaves_breaker_untouched() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::new(429, ""))]));
        let transport = transport(client, RetryConfig::no_retry());

        transport
            .send(HttpRequest::get("https://example.test"))
            .await
            .expect_err("429 fails");

        assert_eq!(transport.breaker.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn exhausted_budget_reports_rate_limited() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::ok("{}"))]));
        let policy = SourcePolicy::default_for(SourceId::Tencent).with_quota_limit(1);
        let transport = SourceTransport::new(policy, Arc::clone(&client) as Arc<dyn HttpClient>);

        transport
            .send(HttpRequest::get("https://example.test"))
            .await
            .expect("first request fits the budget");
        let error = transport
            .send(HttpRequest::get("https://example.test"))
            .await
            .expect_err("second request exceeds budget");

        assert_eq!(error.kind(), SourceErrorKind::RateLimited);
        assert_eq!(client.recorded_requests().len(), 1);
    }

    #[test]
    fn parses_loose_numbers() {
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
    }
}
