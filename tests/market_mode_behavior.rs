//! Behavior-driven tests for market-mode selection
//!
//! These tests verify HOW a market tag turns into an active source list,
//! an index set and a working coordinator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stockpulse_core::{
    ChipFetch, ConfigError, Endpoint, FailoverCoordinator, FetchSettings, HttpClient, HttpFuture,
    HttpRequest, HttpResponse, Market, MarketMode, SourceCredentials, SourceId, SourceRegistry,
    Symbol,
};

struct CountingClient {
    calls: AtomicUsize,
    status: u16,
}

impl CountingClient {
    fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            status,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HttpClient for CountingClient {
    fn execute<'a>(&'a self, _request: HttpRequest) -> HttpFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let status = self.status;
        Box::pin(async move { Ok(HttpResponse::new(status, "")) })
    }
}

fn registry_for(tag: &str, client: Arc<CountingClient>) -> Result<SourceRegistry, ConfigError> {
    let mode = MarketMode::select(tag)?;
    let credentials = SourceCredentials::default().with_tushare_token("token");
    SourceRegistry::standard(&mode, &FetchSettings::default(), &credentials, client)
}

// =============================================================================
// Tag resolution
// =============================================================================

#[test]
fn when_tag_is_unknown_startup_fails_with_configuration_error() {
    // Given: An operator typo in the market tag
    let result = registry_for("jp", CountingClient::new(200));

    // Then: The registry is never built
    assert!(matches!(
        result.err(),
        Some(ConfigError::UnknownMarket { value }) if value == "jp"
    ));
}

#[test]
fn when_tag_aliases_are_used_they_select_the_same_mode() {
    for tag in ["cn", "A", "Domestic"] {
        assert_eq!(
            MarketMode::select(tag).expect("known tag").market,
            Market::Domestic,
            "tag '{tag}'"
        );
    }
    for tag in ["us", "INTERNATIONAL"] {
        assert_eq!(
            MarketMode::select(tag).expect("known tag").market,
            Market::International,
            "tag '{tag}'"
        );
    }
}

#[test]
fn when_domestic_mode_is_selected_five_sources_are_ranked_in_fixed_order() {
    let registry = registry_for("cn", CountingClient::new(200)).expect("valid registry");

    let ids: Vec<SourceId> = registry.descriptors().iter().map(|d| d.id).collect();
    assert_eq!(
        ids,
        vec![
            SourceId::Eastmoney,
            SourceId::Sina,
            SourceId::Tushare,
            SourceId::Tencent,
            SourceId::Yahoo
        ]
    );
    assert!(registry.supports(Endpoint::ChipDistribution));
}

#[test]
fn when_modes_are_selected_index_sets_follow_the_market() {
    let domestic = MarketMode::select("cn").expect("known tag");
    let codes: Vec<&str> = domestic.indices.iter().map(|index| index.code).collect();
    assert_eq!(codes, vec!["000001", "399001", "399006"]);

    let international = MarketMode::select("us").expect("known tag");
    let symbols = international.index_symbols().expect("valid index symbols");
    let codes: Vec<&str> = symbols.iter().map(Symbol::code).collect();
    assert_eq!(codes, vec!["^GSPC", "^IXIC", "^DJI"]);
}

// =============================================================================
// Coordinator wiring
// =============================================================================

#[tokio::test]
async fn when_international_chip_is_requested_no_http_request_is_sent() {
    // Given: The international mode backed by a counting client
    let client = CountingClient::new(200);
    let registry = registry_for("us", Arc::clone(&client)).expect("valid registry");
    let coordinator = FailoverCoordinator::new(Arc::new(registry), Duration::from_secs(5));

    // When: Chip distribution for AAPL is requested
    let symbol = Symbol::parse("AAPL", Market::International).expect("valid ticker");
    let outcome = coordinator
        .get_chip_distribution(&symbol)
        .await
        .expect("not an error");

    // Then: NotApplicable, with zero network calls
    assert!(matches!(outcome, ChipFetch::NotApplicable));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn when_every_domestic_upstream_reports_not_found_all_five_are_listed() {
    // Given: Every upstream answers 404
    let client = CountingClient::new(404);
    let registry = registry_for("cn", Arc::clone(&client)).expect("valid registry");
    let coordinator = FailoverCoordinator::new(Arc::new(registry), Duration::from_secs(5));

    // When: A quote is requested
    let symbol = Symbol::parse("600519", Market::Domestic).expect("valid symbol");
    let error = coordinator
        .get_quote(&symbol)
        .await
        .expect_err("all sources fail");

    // Then: Each source is listed once, in priority order, after one request each
    let sources: Vec<SourceId> = error.failures().iter().map(|f| f.source).collect();
    assert_eq!(
        sources,
        vec![
            SourceId::Eastmoney,
            SourceId::Sina,
            SourceId::Tushare,
            SourceId::Tencent,
            SourceId::Yahoo
        ]
    );
    assert!(error
        .failures()
        .iter()
        .all(|failure| failure.code == "source.symbol_not_found"));
    assert_eq!(client.calls(), 5);
}
