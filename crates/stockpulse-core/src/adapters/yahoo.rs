use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::transport::{parse_json, SourceTransport};
use crate::adapters::ALL_MARKETS;
use crate::data_source::{
    CapabilitySet, DataSource, SourceError, SourceFuture, SourceProfile, SourceSymbol,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::source_policy::SourcePolicy;
use crate::{
    Exchange, Market, PriceHistory, PriceRecord, Quote, SourceId, Symbol, TradeDate, UtcDateTime,
};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart/";
const REFERER: &str = "https://finance.yahoo.com/";

/// Yahoo Finance chart API. Last resort for domestic symbols and the only
/// source for the international market.
pub struct YahooSource {
    transport: SourceTransport,
}

impl YahooSource {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self::with_policy(SourcePolicy::yahoo_default(), http)
    }

    pub fn with_policy(policy: SourcePolicy, http: Arc<dyn HttpClient>) -> Self {
        Self {
            transport: SourceTransport::new(policy, http),
        }
    }

    async fn chart(&self, canonical: &str, query: &str) -> Result<ChartResult, SourceError> {
        let url = format!("{CHART_URL}{}?{query}", urlencoding::encode(canonical));
        let body = self
            .transport
            .send(HttpRequest::get(url).with_referer(REFERER))
            .await?;
        parse_chart(canonical, &body)
    }
}

impl DataSource for YahooSource {
    fn id(&self) -> SourceId {
        SourceId::Yahoo
    }

    fn profile(&self) -> SourceProfile {
        SourceProfile {
            id: SourceId::Yahoo,
            markets: ALL_MARKETS,
            capabilities: CapabilitySet::prices_only(),
            requires_credentials: false,
        }
    }

    /// Domestic codes get Yahoo's exchange suffix (`.SS` for Shanghai);
    /// share-class dots in US tickers become dashes (`BRK.B` → `BRK-B`).
    ///
    /// Yahoo does not list the Beijing exchange. Beijing codes still map to
    /// `.BJ` so the chain stays uniform, and Yahoo's "Not Found" answer comes
    /// back as `SymbolNotFound`.
    fn canonicalize(&self, symbol: &Symbol) -> String {
        match symbol.market() {
            Market::Domestic => {
                let suffix = match symbol.exchange() {
                    Some(Exchange::Shanghai) => "SS",
                    Some(Exchange::Beijing) => "BJ",
                    Some(Exchange::Shenzhen) | None => "SZ",
                };
                format!("{}.{suffix}", symbol.code())
            }
            Market::International => symbol.code().replace('.', "-"),
        }
    }

    fn fetch_history<'a>(
        &'a self,
        target: &'a SourceSymbol,
        start: TradeDate,
        end: TradeDate,
    ) -> SourceFuture<'a, PriceHistory> {
        Box::pin(async move {
            let query = format!(
                "period1={}&period2={}&interval=1d&events=history&includeAdjustedClose=true",
                start.unix_start(),
                end.plus_days(1).unix_start()
            );
            let chart = self.chart(&target.canonical, &query).await?;
            chart.into_history(&target.symbol, start, end)
        })
    }

    fn fetch_quote<'a>(&'a self, target: &'a SourceSymbol) -> SourceFuture<'a, Quote> {
        Box::pin(async move {
            let chart = self.chart(&target.canonical, "range=1d&interval=1d").await?;
            chart.meta.into_quote(&target.symbol)
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    previous_close: Option<f64>,
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    regular_market_time: Option<i64>,
    #[serde(default)]
    regular_market_day_high: Option<f64>,
    #[serde(default)]
    regular_market_day_low: Option<f64>,
    #[serde(default)]
    regular_market_volume: Option<f64>,
    #[serde(default)]
    gmtoffset: i32,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
    #[serde(default)]
    adjclose: Vec<AdjCloseColumn>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct AdjCloseColumn {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn parse_chart(canonical: &str, body: &str) -> Result<ChartResult, SourceError> {
    let envelope: ChartEnvelope = parse_json(SourceId::Yahoo, body)?;
    if let Some(error) = envelope.chart.error {
        let detail = error.description.unwrap_or_default();
        return Err(if error.code.eq_ignore_ascii_case("not found") {
            SourceError::symbol_not_found(format!("yahoo has no chart for {canonical}: {detail}"))
        } else {
            SourceError::unavailable(format!("yahoo chart error {}: {detail}", error.code))
        });
    }

    envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| SourceError::symbol_not_found(format!("yahoo has no chart for {canonical}")))
}

impl ChartResult {
    /// Rows with a null OHLC or volume cell (halts, holidays Yahoo pads) are
    /// skipped rather than filled in.
    fn into_history(
        self,
        symbol: &Symbol,
        start: TradeDate,
        end: TradeDate,
    ) -> Result<PriceHistory, SourceError> {
        let columns = self.indicators.quote.into_iter().next().unwrap_or_default();
        let adjusted = self
            .indicators
            .adjclose
            .into_iter()
            .next()
            .map(|column| column.adjclose)
            .unwrap_or_default();
        let at = |column: &[Option<f64>], index: usize| column.get(index).copied().flatten();

        let mut records = Vec::with_capacity(self.timestamp.len());
        for (index, ts) in self.timestamp.iter().enumerate() {
            let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
                at(&columns.open, index),
                at(&columns.high, index),
                at(&columns.low, index),
                at(&columns.close, index),
                at(&columns.volume, index),
            ) else {
                continue;
            };
            let date = TradeDate::from_unix_local(*ts, self.meta.gmtoffset)?;
            if date < start || date > end {
                continue;
            }
            let volume = volume.round().max(0.0) as u64;
            let record = PriceRecord::new(date, open, high, low, close, volume)?
                .with_adjusted_close(at(&adjusted, index));
            records.push(record);
        }

        Ok(PriceHistory::from_records(symbol.clone(), records))
    }
}

impl ChartMeta {
    fn into_quote(self, symbol: &Symbol) -> Result<Quote, SourceError> {
        let price = self
            .regular_market_price
            .filter(|price| *price > 0.0)
            .ok_or_else(|| SourceError::unavailable("yahoo chart meta lacks a market price"))?;
        let prev_close = self
            .previous_close
            .or(self.chart_previous_close)
            .ok_or_else(|| SourceError::unavailable("yahoo chart meta lacks a previous close"))?;
        let as_of = self
            .regular_market_time
            .ok_or_else(|| SourceError::unavailable("yahoo chart meta lacks a market time"))
            .and_then(|secs| {
                UtcDateTime::from_unix_seconds(secs).map_err(|error| {
                    SourceError::unavailable(format!("yahoo market time {secs} is invalid: {error}"))
                })
            })?;

        let name = self.long_name.or(self.short_name).unwrap_or_default();
        let quote = Quote::from_previous_close(symbol.clone(), price, prev_close, as_of)?
            .with_name(name)
            .with_session(
                None,
                self.regular_market_day_high,
                self.regular_market_day_low,
                self.regular_market_volume.map(|v| v.round().max(0.0) as u64),
            );
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::testing::ScriptedHttpClient;
    use crate::http_client::HttpResponse;

    const CHART: &str = r#"{"chart":{"result":[{
        "meta":{"currency":"USD","symbol":"AAPL","regularMarketPrice":185.64,"chartPreviousClose":192.53,
                "regularMarketTime":1704229201,"gmtoffset":-18000,"regularMarketDayHigh":188.44,
                "regularMarketDayLow":183.89,"regularMarketVolume":82488700,"longName":"Apple Inc."},
        "timestamp":[1704205800,1704292200,1704378600],
        "indicators":{
            "quote":[{"open":[187.15,184.22,null],"high":[188.44,185.88,null],"low":[183.89,183.43,null],
                      "close":[185.64,184.25,null],"volume":[82488700,58414500,null]}],
            "adjclose":[{"adjclose":[184.94,183.55,null]}]
        }}],"error":null}}"#;

    fn international(code: &str) -> Symbol {
        Symbol::parse(code, Market::International).expect("valid symbol")
    }

    fn domestic(code: &str) -> Symbol {
        Symbol::parse(code, Market::Domestic).expect("valid symbol")
    }

    #[test]
    fn canonical_forms_follow_market() {
        let source = YahooSource::new(Arc::new(ScriptedHttpClient::default()));
        assert_eq!(source.canonicalize(&domestic("600519")), "600519.SS");
        assert_eq!(source.canonicalize(&domestic("000001")), "000001.SZ");
        assert_eq!(source.canonicalize(&international("aapl")), "AAPL");
        assert_eq!(source.canonicalize(&international("BRK.B")), "BRK-B");
    }

    #[test]
    fn chart_rows_use_exchange_local_dates_and_skip_nulls() {
        let chart = parse_chart("AAPL", CHART).expect("valid chart");
        let start = TradeDate::parse("2024-01-01").expect("date");
        let end = TradeDate::parse("2024-01-31").expect("date");

        let history = chart
            .into_history(&international("AAPL"), start, end)
            .expect("history");

        assert_eq!(history.len(), 2);
        assert_eq!(history.first_date(), Some(TradeDate::parse("2024-01-02").expect("date")));
        let first = &history.records()[0];
        assert_eq!(first.close, 185.64);
        assert_eq!(first.adjusted_close, Some(184.94));
        assert_eq!(first.volume, 82_488_700);
    }

    #[test]
    fn quote_comes_from_chart_meta() {
        let chart = parse_chart("AAPL", CHART).expect("valid chart");
        let quote = chart.meta.into_quote(&international("AAPL")).expect("quote");

        assert_eq!(quote.price, 185.64);
        assert_eq!(quote.prev_close, Some(192.53));
        assert_eq!(quote.change_pct, -3.58);
        assert_eq!(quote.name.as_deref(), Some("Apple Inc."));
    }

    #[test]
    fn rows_with_null_volume_are_skipped() {
        let body = r#"{"chart":{"result":[{
            "meta":{"regularMarketPrice":10.0,"gmtoffset":28800},
            "timestamp":[1704159000,1704245400],
            "indicators":{"quote":[{"open":[10.0,10.2],"high":[10.5,10.6],"low":[9.8,10.0],
                                    "close":[10.2,10.4],"volume":[null,1200]}]}}],"error":null}}"#;
        let chart = parse_chart("600519.SS", body).expect("valid chart");
        let start = TradeDate::parse("2024-01-01").expect("date");
        let end = TradeDate::parse("2024-01-31").expect("date");

        let history = chart.into_history(&domestic("600519"), start, end).expect("history");

        assert_eq!(history.len(), 1);
        let only = &history.records()[0];
        assert_eq!(only.date, TradeDate::parse("2024-01-03").expect("date"));
        assert_eq!(only.volume, 1_200);
        assert_eq!(only.turnover, Some(1_200.0 * 10.4));
    }

    #[test]
    fn quote_without_previous_close_is_unavailable() {
        let meta = ChartMeta {
            regular_market_price: Some(185.64),
            regular_market_time: Some(1_704_229_201),
            ..ChartMeta::default()
        };

        let error = meta.into_quote(&international("AAPL")).expect_err("no previous close");

        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        assert!(error.message().contains("previous close"));
    }

    #[test]
    fn quote_without_market_time_is_unavailable() {
        let meta = ChartMeta {
            regular_market_price: Some(185.64),
            chart_previous_close: Some(192.53),
            ..ChartMeta::default()
        };

        let error = meta.into_quote(&international("AAPL")).expect_err("no market time");

        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        assert!(error.message().contains("market time"));
    }

    #[tokio::test]
    async fn beijing_codes_come_back_as_symbol_not_found() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::new(404, body))]));
        let source = YahooSource::new(Arc::clone(&client) as Arc<dyn HttpClient>);
        let target = SourceSymbol::for_source(&source, domestic("830799"));

        let error = source.fetch_quote(&target).await.expect_err("beijing unlisted");

        assert_eq!(target.canonical, "830799.BJ");
        assert_eq!(error.kind(), SourceErrorKind::SymbolNotFound);
        assert_eq!(client.recorded_requests().len(), 1);
    }

    #[test]
    fn not_found_chart_error_maps_to_symbol_not_found() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let error = parse_chart("ZZZZ", body).expect_err("not found");
        assert_eq!(error.kind(), SourceErrorKind::SymbolNotFound);
    }

    #[tokio::test]
    async fn history_request_uses_period_bounds() {
        let client = Arc::new(ScriptedHttpClient::ok(CHART));
        let source = YahooSource::new(Arc::clone(&client) as Arc<dyn HttpClient>);
        let target = SourceSymbol::for_source(&source, domestic("600519"));
        let start = TradeDate::parse("2024-01-02").expect("date");
        let end = TradeDate::parse("2024-01-03").expect("date");

        let _ = source.fetch_history(&target, start, end).await;

        let url = &client.recorded_requests()[0].url;
        assert!(url.starts_with("https://query1.finance.yahoo.com/v8/finance/chart/600519.SS?"));
        assert!(url.contains("period1=1704153600&period2=1704326400"));
    }
}
