use std::sync::Arc;

use serde_json::Value;

use crate::adapters::transport::{parse_json, parse_number, SourceTransport};
use crate::adapters::{beijing_time, json_number, within_range, DOMESTIC_ONLY};
use crate::data_source::{
    CapabilitySet, DataSource, SourceError, SourceFuture, SourceProfile, SourceSymbol,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::source_policy::SourcePolicy;
use crate::{
    Exchange, PriceHistory, PriceRecord, Quote, SourceId, Symbol, TradeDate, UtcDateTime,
};

const KLINE_URL: &str = "https://web.ifzq.gtimg.cn/appstock/app/fqkline/get";
const QUOTE_URL: &str = "https://qt.gtimg.cn/q=";
/// Bar cap accepted by the kline endpoint.
const MAX_BARS: u32 = 640;

/// Tencent Finance (gtimg). Forward-adjusted daily klines plus the
/// tilde-separated realtime quote feed.
pub struct TencentSource {
    transport: SourceTransport,
}

impl TencentSource {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self::with_policy(SourcePolicy::tencent_default(), http)
    }

    pub fn with_policy(policy: SourcePolicy, http: Arc<dyn HttpClient>) -> Self {
        Self {
            transport: SourceTransport::new(policy, http),
        }
    }
}

impl DataSource for TencentSource {
    fn id(&self) -> SourceId {
        SourceId::Tencent
    }

    fn profile(&self) -> SourceProfile {
        SourceProfile {
            id: SourceId::Tencent,
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
            let param = format!(
                "{},day,{},{},{MAX_BARS},qfq",
                target.canonical,
                start.format_iso(),
                end.format_iso()
            );
            let url = format!("{KLINE_URL}?param={}", urlencoding::encode(&param));
            let body = self.transport.send(HttpRequest::get(url)).await?;
            let history = parse_klines(&target.symbol, &target.canonical, &body)?;
            Ok(within_range(history, start, end))
        })
    }

    fn fetch_quote<'a>(&'a self, target: &'a SourceSymbol) -> SourceFuture<'a, Quote> {
        Box::pin(async move {
            let url = format!("{QUOTE_URL}{}", urlencoding::encode(&target.canonical));
            let body = self.transport.send(HttpRequest::get(url)).await?;
            parse_quote(&target.symbol, &body)
        })
    }
}

/// Rows under `data.<code>.qfqday` (or `day` when no adjustment applies):
/// `[date, open, close, high, low, volume(lots), ...]`.
fn parse_klines(symbol: &Symbol, canonical: &str, body: &str) -> Result<PriceHistory, SourceError> {
    let envelope: Value = parse_json(SourceId::Tencent, body)?;
    let rows = envelope
        .get("data")
        .and_then(|data| data.get(canonical))
        .and_then(|entry| entry.get("qfqday").or_else(|| entry.get("day")))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            SourceError::symbol_not_found(format!("tencent has no klines for {canonical}"))
        })?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let cells = row.as_array().filter(|cells| cells.len() >= 6).ok_or_else(|| {
            SourceError::unavailable(format!("tencent kline row is malformed: {row}"))
        })?;
        let number = |index: usize| {
            json_number(&cells[index]).ok_or_else(|| {
                SourceError::unavailable(format!("tencent kline cell {index} is not numeric"))
            })
        };
        let date = cells[0]
            .as_str()
            .ok_or_else(|| SourceError::unavailable("tencent kline date is not text"))?;

        let record = PriceRecord::new(
            TradeDate::parse(date)?,
            number(1)?,
            number(3)?,
            number(4)?,
            number(2)?,
            (number(5)? * 100.0).round().max(0.0) as u64,
        )?;
        records.push(record);
    }

    Ok(PriceHistory::from_records(symbol.clone(), records))
}

/// Parses `v_sh600519="1~name~code~price~prev_close~open~volume(lots)~...";`.
/// Field 30 is `YYYYMMDDHHMMSS`, 31/32 change and percent, 33/34 high and low.
fn parse_quote(symbol: &Symbol, body: &str) -> Result<Quote, SourceError> {
    if body.trim_start().starts_with("v_pv_none_match") {
        return Err(SourceError::symbol_not_found(format!(
            "tencent has no quote for {symbol}"
        )));
    }
    let payload = match (body.find('"'), body.rfind('"')) {
        (Some(first), Some(last)) if last > first => &body[first + 1..last],
        _ => {
            return Err(SourceError::unavailable(
                "tencent quote response is not a v_ assignment",
            ))
        }
    };

    let fields: Vec<&str> = payload.split('~').collect();
    if fields.len() < 35 {
        return Err(SourceError::unavailable(format!(
            "tencent quote has {} fields, expected at least 35",
            fields.len()
        )));
    }

    let price = parse_number(fields[3])
        .filter(|price| *price > 0.0)
        .ok_or_else(|| SourceError::unavailable("tencent quote lacks a price"))?;
    let as_of = fields[30]
        .get(..8)
        .and_then(|date| TradeDate::parse_compact(date).ok())
        .and_then(|date| beijing_time(date, fields[30].get(8..).unwrap_or_default()))
        .ok_or_else(|| {
            SourceError::unavailable(format!("tencent quote time '{}' is unreadable", fields[30]))
        })?;

    let mut quote = match (parse_number(fields[31]), parse_number(fields[32])) {
        (Some(change), Some(change_pct)) => {
            Quote::new(symbol.clone(), price, change, change_pct, as_of)?
        }
        _ => {
            let prev_close = parse_number(fields[4])
                .ok_or_else(|| SourceError::unavailable("tencent quote lacks previous close"))?;
            Quote::from_previous_close(symbol.clone(), price, prev_close, as_of)?
        }
    };
    quote.prev_close = parse_number(fields[4]);

    Ok(quote.with_name(fields[1]).with_session(
        parse_number(fields[5]),
        parse_number(fields[33]),
        parse_number(fields[34]),
        parse_number(fields[6]).map(|lots| (lots * 100.0).round().max(0.0) as u64),
    ))
}
