use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::transport::{parse_json, parse_number, SourceTransport};
use crate::adapters::{beijing_time, within_range, DOMESTIC_ONLY};
use crate::data_source::{
    CapabilitySet, DataSource, SourceError, SourceFuture, SourceProfile, SourceSymbol,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::source_policy::SourcePolicy;
use crate::{Exchange, PriceHistory, PriceRecord, Quote, SourceId, Symbol, TradeDate};

const KLINE_URL: &str =
    "https://quotes.sina.cn/cn/api/json_v2.php/CN_MarketDataService.getKLineData";
const QUOTE_URL: &str = "https://hq.sinajs.cn/list=";
const REFERER: &str = "https://finance.sina.com.cn";
/// Largest `datalen` the kline endpoint honours.
const MAX_BARS: i64 = 1023;

/// Sina Finance. The kline endpoint only supports "last N bars", so the
/// requested window is trimmed locally.
pub struct SinaSource {
    transport: SourceTransport,
}

impl SinaSource {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self::with_policy(SourcePolicy::sina_default(), http)
    }

    pub fn with_policy(policy: SourcePolicy, http: Arc<dyn HttpClient>) -> Self {
        Self {
            transport: SourceTransport::new(policy, http),
        }
    }
}

impl DataSource for SinaSource {
    fn id(&self) -> SourceId {
        SourceId::Sina
    }

    fn profile(&self) -> SourceProfile {
        SourceProfile {
            id: SourceId::Sina,
            markets: DOMESTIC_ONLY,
            capabilities: CapabilitySet::prices_only(),
            requires_credentials: false,
        }
    }

    fn canonicalize(&self, symbol: &Symbol) -> String {
        let exchange = symbol.exchange().unwrap_or(Exchange::Shenzhen);
        format!("{}{}", exchange.prefix(), symbol.code())
    }

    fn fetch_history<'a>(
        &'a self,
        target: &'a SourceSymbol,
        start: TradeDate,
        end: TradeDate,
    ) -> SourceFuture<'a, PriceHistory> {
        Box::pin(async move {
            // Trading days never outnumber calendar days, so this always
            // reaches back to `start`.
            let bars = (TradeDate::today_utc().days_since(start) + 1).clamp(1, MAX_BARS);
            let url = format!(
                "{KLINE_URL}?symbol={}&scale=240&ma=no&datalen={bars}",
                urlencoding::encode(&target.canonical)
            );
            let body = self
                .transport
                .send(HttpRequest::get(url).with_referer(REFERER))
                .await?;
            let history = parse_klines(&target.symbol, &body)?;
            Ok(within_range(history, start, end))
        })
    }

    fn fetch_quote<'a>(&'a self, target: &'a SourceSymbol) -> SourceFuture<'a, Quote> {
        Box::pin(async move {
            let url = format!("{QUOTE_URL}{}", urlencoding::encode(&target.canonical));
            let body = self
                .transport
                .send(HttpRequest::get(url).with_referer(REFERER))
                .await?;
            parse_quote(&target.symbol, &body)
        })
    }
}

#[derive(Debug, Deserialize)]
struct SinaBar {
    day: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

fn parse_klines(symbol: &Symbol, body: &str) -> Result<PriceHistory, SourceError> {
    let bars: Option<Vec<SinaBar>> = parse_json(SourceId::Sina, body.trim())?;
    let Some(bars) = bars else {
        return Err(SourceError::symbol_not_found(format!(
            "sina has no klines for {symbol}"
        )));
    };

    let mut records = Vec::with_capacity(bars.len());
    for bar in bars {
        let number = |name: &str, value: &str| {
            parse_number(value).ok_or_else(|| {
                SourceError::unavailable(format!("sina kline field '{name}' is not numeric"))
            })
        };
        let record = PriceRecord::new(
            TradeDate::parse(&bar.day)?,
            number("open", &bar.open)?,
            number("high", &bar.high)?,
            number("low", &bar.low)?,
            number("close", &bar.close)?,
            number("volume", &bar.volume)?.round().max(0.0) as u64,
        )?;
        records.push(record);
    }

    Ok(PriceHistory::from_records(symbol.clone(), records))
}

/// Parses `var hq_str_sh600519="name,open,prev_close,price,high,low,...";`.
/// Field 8 is volume in shares, 30 the date and 31 the time.
fn parse_quote(symbol: &Symbol, body: &str) -> Result<Quote, SourceError> {
    let payload = match (body.find('"'), body.rfind('"')) {
        (Some(first), Some(last)) if last > first => &body[first + 1..last],
        _ => {
            return Err(SourceError::unavailable(
                "sina quote response is not a hq_str assignment",
            ))
        }
    };
    if payload.trim().is_empty() {
        return Err(SourceError::symbol_not_found(format!(
            "sina has no quote for {symbol}"
        )));
    }

    let fields: Vec<&str> = payload.split(',').collect();
    if fields.len() < 32 {
        return Err(SourceError::unavailable(format!(
            "sina quote has {} fields, expected at least 32",
            fields.len()
        )));
    }

    let prev_close = parse_number(fields[2])
        .ok_or_else(|| SourceError::unavailable("sina quote lacks previous close"))?;
    // Before the opening auction the price column reads 0.
    let price = parse_number(fields[3])
        .filter(|price| *price > 0.0)
        .ok_or_else(|| SourceError::unavailable(format!("sina has no trade price for {symbol} yet")))?;
    let as_of = TradeDate::parse(fields[30])
        .ok()
        .and_then(|date| beijing_time(date, fields[31]))
        .ok_or_else(|| {
            SourceError::unavailable(format!(
                "sina quote time '{} {}' is unreadable",
                fields[30], fields[31]
            ))
        })?;

    let quote = Quote::from_previous_close(symbol.clone(), price, prev_close, as_of)?
        .with_name(fields[0])
        .with_session(
            parse_number(fields[1]),
            parse_number(fields[4]),
            parse_number(fields[5]),
            parse_number(fields[8]).map(|shares| shares.round().max(0.0) as u64),
        );
    Ok(quote)
}
