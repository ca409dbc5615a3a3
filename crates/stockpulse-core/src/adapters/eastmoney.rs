use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::adapters::transport::{parse_json, parse_number, SourceTransport};
use crate::adapters::{json_number, within_range, DOMESTIC_ONLY};
use crate::chip;
use crate::data_source::{
    CapabilitySet, DataSource, SourceError, SourceFuture, SourceProfile, SourceSymbol,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::source_policy::SourcePolicy;
use crate::{
    ChipOutcome, Exchange, PriceHistory, PriceRecord, Quote, SourceId, Symbol, TradeDate,
    UtcDateTime,
};

const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
const QUOTE_URL: &str = "https://push2.eastmoney.com/api/qt/stock/get";
const REFERER: &str = "https://quote.eastmoney.com/";
/// Calendar days fetched to cover the chip estimator's lookback.
const CHIP_CALENDAR_DAYS: u32 = 200;

/// Eastmoney web API. Primary domestic source and the only one able to
/// estimate chip distribution, since its klines carry the turnover rate.
pub struct EastmoneySource {
    transport: SourceTransport,
}

impl EastmoneySource {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self::with_policy(SourcePolicy::eastmoney_default(), http)
    }

    pub fn with_policy(policy: SourcePolicy, http: Arc<dyn HttpClient>) -> Self {
        Self {
            transport: SourceTransport::new(policy, http),
        }
    }

    async fn history(
        &self,
        target: &SourceSymbol,
        start: TradeDate,
        end: TradeDate,
    ) -> Result<PriceHistory, SourceError> {
        let url = format!(
            "{KLINE_URL}?secid={}&fields1=f1,f2,f3,f4,f5,f6\
             &fields2=f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61\
             &klt=101&fqt=1&beg={}&end={}",
            urlencoding::encode(&target.canonical),
            start.format_compact(),
            end.format_compact()
        );
        let body = self
            .transport
            .send(HttpRequest::get(url).with_referer(REFERER))
            .await?;
        let history = parse_klines(&target.symbol, &body)?;
        Ok(within_range(history, start, end))
    }
}

impl DataSource for EastmoneySource {
    fn id(&self) -> SourceId {
        SourceId::Eastmoney
    }

    fn profile(&self) -> SourceProfile {
        SourceProfile {
            id: SourceId::Eastmoney,
            markets: DOMESTIC_ONLY,
            capabilities: CapabilitySet::full(),
            requires_credentials: false,
        }
    }

    /// Eastmoney's `secid`: market number, dot, code. Shanghai is market 1,
    /// Shenzhen and Beijing share market 0.
    fn canonicalize(&self, symbol: &Symbol) -> String {
        let market = match symbol.exchange() {
            Some(Exchange::Shanghai) => 1,
            _ => 0,
        };
        format!("{market}.{}", symbol.code())
    }

    fn fetch_history<'a>(
        &'a self,
        target: &'a SourceSymbol,
        start: TradeDate,
        end: TradeDate,
    ) -> SourceFuture<'a, PriceHistory> {
        Box::pin(self.history(target, start, end))
    }

    fn fetch_quote<'a>(&'a self, target: &'a SourceSymbol) -> SourceFuture<'a, Quote> {
        Box::pin(async move {
            let url = format!(
                "{QUOTE_URL}?secid={}&fltt=2&fields=f43,f44,f45,f46,f47,f57,f58,f60,f86,f169,f170",
                urlencoding::encode(&target.canonical)
            );
            let body = self
                .transport
                .send(HttpRequest::get(url).with_referer(REFERER))
                .await?;
            parse_quote(&target.symbol, &body)
        })
    }

    fn fetch_chip_distribution<'a>(
        &'a self,
        target: &'a SourceSymbol,
    ) -> SourceFuture<'a, ChipOutcome> {
        Box::pin(async move {
            let end = TradeDate::today_utc();
            let history = self
                .history(target, end.minus_days(CHIP_CALENDAR_DAYS), end)
                .await?;
            if history.is_empty() {
                return Err(SourceError::symbol_not_found(format!(
                    "eastmoney has no klines for {}",
                    target.canonical
                )));
            }
            chip::estimate(&target.symbol, history.records())?
                .map(ChipOutcome::Available)
                .ok_or_else(|| {
                    SourceError::unavailable("eastmoney klines carry no turnover rate")
                })
        })
    }
}

#[derive(Debug, Deserialize)]
struct KlineEnvelope {
    #[serde(default)]
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

/// Kline rows are comma-joined:
/// `date,open,close,high,low,volume(lots),amount,amplitude,pct_chg,change,turnover_rate(%)`.
fn parse_klines(symbol: &Symbol, body: &str) -> Result<PriceHistory, SourceError> {
    let envelope: KlineEnvelope = parse_json(SourceId::Eastmoney, body)?;
    let Some(data) = envelope.data else {
        return Err(SourceError::symbol_not_found(format!(
            "eastmoney returned no data for {symbol}"
        )));
    };

    let mut records = Vec::with_capacity(data.klines.len());
    for line in &data.klines {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 11 {
            return Err(SourceError::unavailable(format!(
                "eastmoney kline row has {} fields: '{line}'",
                fields.len()
            )));
        }
        let number = |index: usize| {
            parse_number(fields[index]).ok_or_else(|| {
                SourceError::unavailable(format!("eastmoney kline field {index} is not numeric"))
            })
        };

        let date = TradeDate::parse(fields[0])?;
        let lots = number(5)?;
        let record = PriceRecord::new(
            date,
            number(1)?,
            number(3)?,
            number(4)?,
            number(2)?,
            (lots * 100.0).round().max(0.0) as u64,
        )?
        .with_turnover(parse_number(fields[6]))
        .with_change_pct(parse_number(fields[8]))
        .with_turnover_rate(parse_number(fields[10]).map(|pct| pct / 100.0));
        records.push(record);
    }

    Ok(PriceHistory::from_records(symbol.clone(), records))
}

fn parse_quote(symbol: &Symbol, body: &str) -> Result<Quote, SourceError> {
    let envelope: Value = parse_json(SourceId::Eastmoney, body)?;
    let data = envelope
        .get("data")
        .filter(|data| !data.is_null())
        .ok_or_else(|| {
            SourceError::symbol_not_found(format!("eastmoney has no quote for {symbol}"))
        })?;

    let field = |key: &str| data.get(key).and_then(json_number);
    let price = field("f43")
        .filter(|price| *price > 0.0)
        .ok_or_else(|| SourceError::unavailable(format!("eastmoney has no live price for {symbol}")))?;
    let as_of = field("f86")
        .and_then(|secs| UtcDateTime::from_unix_seconds(secs as i64).ok())
        .ok_or_else(|| SourceError::unavailable(format!("eastmoney quote for {symbol} has no time")))?;

    let quote = match (field("f169"), field("f170")) {
        (Some(change), Some(change_pct)) => {
            let mut quote = Quote::new(symbol.clone(), price, change, change_pct, as_of)?;
            quote.prev_close = field("f60");
            quote
        }
        _ => {
            let prev_close = field("f60").ok_or_else(|| {
                SourceError::unavailable("eastmoney quote lacks change and previous close")
            })?;
            Quote::from_previous_close(symbol.clone(), price, prev_close, as_of)?
        }
    };

    let name = data.get("f58").and_then(Value::as_str).unwrap_or_default();
    Ok(quote.with_name(name).with_session(
        field("f46"),
        field("f44"),
        field("f45"),
        field("f47").map(|lots| (lots * 100.0).round().max(0.0) as u64),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::testing::ScriptedHttpClient;
    use crate::Market;

    const KLINES: &str = r#"{"rc":0,"data":{"code":"600519","market":1,"name":"贵州茅台","klines":[
        "2024-01-02,1715.00,1685.01,1718.19,1678.10,32156,5440082165.00,2.33,-1.46,-24.99,0.26",
        "2024-01-03,1681.00,1694.00,1695.22,1676.33,20350,3434530256.00,1.12,0.53,8.99,0.16"
    ]}}"#;

    fn symbol(code: &str) -> Symbol {
        Symbol::parse(code, Market::Domestic).expect("valid symbol")
    }

    fn source(client: Arc<ScriptedHttpClient>) -> EastmoneySource {
        EastmoneySource::new(client)
    }

    #[test]
    fn secid_uses_exchange_market_number() {
        let source = source(Arc::new(ScriptedHttpClient::default()));
        assert_eq!(source.canonicalize(&symbol("600519")), "1.600519");
        assert_eq!(source.canonicalize(&symbol("000001")), "0.000001");
        assert_eq!(source.canonicalize(&symbol("830799")), "0.830799");
    }

    #[test]
    fn parses_kline_rows_with_lot_volume_and_turnover_rate() {
        let history = parse_klines(&symbol("600519"), KLINES).expect("valid klines");

        assert_eq!(history.len(), 2);
        let first = &history.records()[0];
        assert_eq!(first.open, 1715.0);
        assert_eq!(first.close, 1685.01);
        assert_eq!(first.high, 1718.19);
        assert_eq!(first.low, 1678.10);
        assert_eq!(first.volume, 3_215_600);
        assert_eq!(first.change_pct, Some(-1.46));
        assert_eq!(first.turnover_rate, Some(0.0026));
    }

    #[test]
    fn null_data_means_unknown_symbol() {
        let error = parse_klines(&symbol("600000"), r#"{"rc":0,"data":null}"#)
            .expect_err("no data");
        assert_eq!(error.kind(), SourceErrorKind::SymbolNotFound);
    }

    #[test]
    fn short_kline_row_is_malformed_payload() {
        let body = r#"{"data":{"klines":["2024-01-02,1,2,3"]}}"#;
        let error = parse_klines(&symbol("600519"), body).expect_err("short row");
        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
    }

    #[test]
    fn parses_push2_quote() {
        let body = r#"{"rc":0,"data":{"f43":1685.01,"f44":1718.19,"f45":1678.1,"f46":1715.0,
            "f47":32156,"f57":"600519","f58":"贵州茅台","f60":1710.0,"f86":1704178803,
            "f169":-24.99,"f170":-1.46}}"#;
        let quote = parse_quote(&symbol("600519"), body).expect("valid quote");

        assert_eq!(quote.price, 1685.01);
        assert_eq!(quote.change, -24.99);
        assert_eq!(quote.change_pct, -1.46);
        assert_eq!(quote.name.as_deref(), Some("贵州茅台"));
        assert_eq!(quote.volume, Some(3_215_600));
        assert_eq!(quote.as_of.format_rfc3339(), "2024-01-02T07:00:03Z");
    }

    #[test]
    fn suspended_quote_without_price_is_unavailable() {
        let body = r#"{"data":{"f43":"-","f58":"停牌股"}}"#;
        let error = parse_quote(&symbol("600519"), body).expect_err("no price");
        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
    }

    #[test]
    fn quote_without_time_is_unavailable() {
        let body = r#"{"data":{"f43":1685.01,"f58":"贵州茅台","f60":1710.0,"f169":-24.99,"f170":-1.46}}"#;
        let error = parse_quote(&symbol("600519"), body).expect_err("no time");
        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        assert!(error.message().contains("has no time"));
    }

    #[tokio::test]
    async fn history_request_targets_secid_and_range() {
        let client = Arc::new(ScriptedHttpClient::ok(KLINES));
        let source = source(Arc::clone(&client));
        let target = SourceSymbol::for_source(&source, symbol("600519"));
        let start = TradeDate::parse("2024-01-01").expect("date");
        let end = TradeDate::parse("2024-01-31").expect("date");

        let history = source
            .fetch_history(&target, start, end)
            .await
            .expect("history");

        assert_eq!(history.len(), 2);
        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.contains("secid=1.600519"));
        assert!(requests[0].url.contains("beg=20240101&end=20240131"));
    }
}
