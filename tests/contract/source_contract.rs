use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use stockpulse_core::{
    ChipOutcome, DataSource, EastmoneySource, HttpClient, HttpFuture, HttpRequest, HttpResponse,
    Market, MarketMode, SinaSource, SourceErrorKind, SourceId, SourceSymbol, Symbol,
    TencentSource, TushareSource, YahooSource,
};

/// Answers every request with one fixed status and counts the calls.
struct FixedStatusClient {
    status: u16,
    calls: AtomicUsize,
}

impl FixedStatusClient {
    fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HttpClient for FixedStatusClient {
    fn execute<'a>(&'a self, _request: HttpRequest) -> HttpFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let status = self.status;
        Box::pin(async move { Ok(HttpResponse::new(status, "")) })
    }
}

struct SourceCase {
    id: SourceId,
    source: Arc<dyn DataSource>,
    markets: &'static [Market],
    supports_chip: bool,
}

fn source_cases(http: Arc<FixedStatusClient>) -> Vec<SourceCase> {
    let http: Arc<dyn HttpClient> = http;
    vec![
        SourceCase {
            id: SourceId::Eastmoney,
            source: Arc::new(EastmoneySource::new(Arc::clone(&http))),
            markets: &[Market::Domestic],
            supports_chip: true,
        },
        SourceCase {
            id: SourceId::Sina,
            source: Arc::new(SinaSource::new(Arc::clone(&http))),
            markets: &[Market::Domestic],
            supports_chip: false,
        },
        SourceCase {
            id: SourceId::Tushare,
            source: Arc::new(TushareSource::new("contract-token", Arc::clone(&http))),
            markets: &[Market::Domestic],
            supports_chip: false,
        },
        SourceCase {
            id: SourceId::Tencent,
            source: Arc::new(TencentSource::new(Arc::clone(&http))),
            markets: &[Market::Domestic],
            supports_chip: false,
        },
        SourceCase {
            id: SourceId::Yahoo,
            source: Arc::new(YahooSource::new(Arc::clone(&http))),
            markets: &[Market::Domestic, Market::International],
            supports_chip: false,
        },
    ]
}

#[test]
fn canonicalize_is_deterministic_and_never_touches_the_network() {
    let http = FixedStatusClient::new(200);
    let symbols = [
        Symbol::parse("600519", Market::Domestic).expect("valid symbol"),
        Symbol::parse("sz000001", Market::Domestic).expect("valid symbol"),
        Symbol::parse("430047", Market::Domestic).expect("valid symbol"),
    ];

    for case in source_cases(Arc::clone(&http)) {
        for symbol in &symbols {
            let first = case.source.canonicalize(symbol);
            let second = case.source.canonicalize(&symbol.clone());
            assert_eq!(first, second, "source '{}': canonical form is stable", case.id);
            assert!(
                first.contains(symbol.code()),
                "source '{}': canonical form '{first}' keeps the code",
                case.id
            );
        }
    }

    assert_eq!(http.calls(), 0);
}

#[test]
fn canonical_forms_match_each_source_convention() {
    let http = FixedStatusClient::new(200);
    let symbol = Symbol::parse("600519", Market::Domestic).expect("valid symbol");
    let expected = [
        (SourceId::Eastmoney, "1.600519"),
        (SourceId::Sina, "sh600519"),
        (SourceId::Tushare, "600519.SH"),
        (SourceId::Tencent, "sh600519"),
        (SourceId::Yahoo, "600519.SS"),
    ];

    for (case, (id, canonical)) in source_cases(http).iter().zip(expected) {
        assert_eq!(case.id, id);
        assert_eq!(case.source.canonicalize(&symbol), canonical, "source '{id}'");
    }
}

#[test]
fn profiles_agree_with_market_table() {
    let http = FixedStatusClient::new(200);

    for case in source_cases(http) {
        let profile = case.source.profile();
        assert_eq!(profile.id, case.id);
        assert_eq!(case.source.id(), case.id);
        assert_eq!(profile.markets, case.markets, "source '{}': markets", case.id);
        assert_eq!(
            profile.capabilities.chip_distribution, case.supports_chip,
            "source '{}': chip capability",
            case.id
        );
        assert_eq!(profile.requires_credentials, case.id == SourceId::Tushare);

        for market in case.markets {
            assert!(
                MarketMode::for_market(*market).rank_of(case.id).is_some(),
                "source '{}' is active in every market it serves",
                case.id
            );
        }
    }
}

#[test]
fn sources_without_chip_support_answer_not_applicable_without_requests() {
    let http = FixedStatusClient::new(200);
    let symbol = Symbol::parse("600519", Market::Domestic).expect("valid symbol");

    for case in source_cases(Arc::clone(&http))
        .into_iter()
        .filter(|case| !case.supports_chip)
    {
        let target = SourceSymbol::for_source(case.source.as_ref(), symbol.clone());
        let outcome = block_on(case.source.fetch_chip_distribution(&target))
            .unwrap_or_else(|error| panic!("source '{}' chip failed: {error}", case.id));
        assert_eq!(outcome, ChipOutcome::NotApplicable, "source '{}'", case.id);
    }

    assert_eq!(http.calls(), 0);
}

#[tokio::test]
async fn upstream_not_found_maps_to_symbol_not_found_for_every_source() {
    let http = FixedStatusClient::new(404);
    let symbol = Symbol::parse("600519", Market::Domestic).expect("valid symbol");

    for case in source_cases(Arc::clone(&http)) {
        let target = SourceSymbol::for_source(case.source.as_ref(), symbol.clone());
        let error = case
            .source
            .fetch_quote(&target)
            .await
            .expect_err("404 is a failure");
        assert_eq!(
            error.kind(),
            SourceErrorKind::SymbolNotFound,
            "source '{}': 404 mapping",
            case.id
        );
        assert!(!error.retryable());
    }
}

#[tokio::test]
async fn upstream_auth_failure_maps_to_unavailable_for_every_source() {
    let http = FixedStatusClient::new(403);
    let symbol = Symbol::parse("000001", Market::Domestic).expect("valid symbol");

    for case in source_cases(Arc::clone(&http)) {
        let target = SourceSymbol::for_source(case.source.as_ref(), symbol.clone());
        let error = case
            .source
            .fetch_quote(&target)
            .await
            .expect_err("403 is a failure");
        assert_eq!(
            error.kind(),
            SourceErrorKind::Unavailable,
            "source '{}': 403 mapping",
            case.id
        );
    }
}

fn block_on<F>(future: F) -> F::Output
where
    F: Future,
{
    let waker = noop_waker();
    let mut context = Context::from_waker(&waker);
    let mut future = std::pin::pin!(future);

    loop {
        match future.as_mut().poll(&mut context) {
            Poll::Ready(output) => return output,
            Poll::Pending => std::thread::yield_now(),
        }
    }
}

fn noop_waker() -> Waker {
    // SAFETY: The vtable functions never dereference the data pointer and are no-op operations.
    unsafe { Waker::from_raw(noop_raw_waker()) }
}

fn noop_raw_waker() -> RawWaker {
    RawWaker::new(std::ptr::null(), &NOOP_WAKER_VTABLE)
}

unsafe fn noop_clone(_: *const ()) -> RawWaker {
    noop_raw_waker()
}

unsafe fn noop_wake(_: *const ()) {}

unsafe fn noop_wake_by_ref(_: *const ()) {}

unsafe fn noop_drop(_: *const ()) {}

static NOOP_WAKER_VTABLE: RawWakerVTable =
    RawWakerVTable::new(noop_clone, noop_wake, noop_wake_by_ref, noop_drop);
