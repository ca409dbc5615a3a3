use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::adapters::transport::{parse_json, SourceTransport};
use crate::adapters::{beijing_close, json_number, DOMESTIC_ONLY};
use crate::data_source::{
    CapabilitySet, DataSource, SourceError, SourceFuture, SourceProfile, SourceSymbol,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::source_policy::SourcePolicy;
use crate::{Exchange, PriceHistory, PriceRecord, Quote, SourceId, Symbol, TradeDate};

const API_URL: &str = "https://api.tushare.pro";
const DAILY_FIELDS: &str = "ts_code,trade_date,open,high,low,close,pre_close,change,pct_chg,vol,amount";
/// Calendar days searched backwards for the latest bar when quoting.
const QUOTE_LOOKBACK_DAYS: u32 = 14;

/// Tushare Pro. Token-authenticated JSON RPC; end-of-day bars only, so the
/// quote is the most recent daily close.
pub struct TushareSource {
    token: String,
    transport: SourceTransport,
}

impl TushareSource {
    pub fn new(token: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self::with_policy(token, SourcePolicy::tushare_default(), http)
    }

    pub fn with_policy(
        token: impl Into<String>,
        policy: SourcePolicy,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            token: token.into(),
            transport: SourceTransport::new(policy, http),
        }
    }

    async fn daily(
        &self,
        target: &SourceSymbol,
        start: TradeDate,
        end: TradeDate,
    ) -> Result<Vec<DailyRow>, SourceError> {
        let body = json!({
            "api_name": "daily",
            "token": self.token,
            "params": {
                "ts_code": target.canonical,
                "start_date": start.format_compact(),
                "end_date": end.format_compact(),
            },
            "fields": DAILY_FIELDS,
        });
        let response = self
            .transport
            .send(HttpRequest::post_json(API_URL, &body))
            .await?;
        parse_daily(&response)
    }
}

impl DataSource for TushareSource {
    fn id(&self) -> SourceId {
        SourceId::Tushare
    }

    fn profile(&self) -> SourceProfile {
        SourceProfile {
            id: SourceId::Tushare,
            markets: DOMESTIC_ONLY,
            capabilities: CapabilitySet::prices_only(),
            requires_credentials: true,
        }
    }

    fn canonicalize(&self, symbol: &Symbol) -> String {
        let exchange = symbol.exchange().unwrap_or(Exchange::Shenzhen);
        format!("{}.{}", symbol.code(), exchange.suffix())
    }

    fn fetch_history<'a>(
        &'a self,
        target: &'a SourceSymbol,
        start: TradeDate,
        end: TradeDate,
    ) -> SourceFuture<'a, PriceHistory> {
        Box::pin(async move {
            let rows = self.daily(target, start, end).await?;
            let records = rows
                .into_iter()
                .map(DailyRow::into_record)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(PriceHistory::from_records(target.symbol.clone(), records))
        })
    }

    fn fetch_quote<'a>(&'a self, target: &'a SourceSymbol) -> SourceFuture<'a, Quote> {
        Box::pin(async move {
            let end = TradeDate::today_utc();
            let rows = self
                .daily(target, end.minus_days(QUOTE_LOOKBACK_DAYS), end)
                .await?;
            let latest = rows
                .into_iter()
                .max_by_key(|row| row.date)
                .ok_or_else(|| {
                    SourceError::symbol_not_found(format!(
                        "tushare has no recent bars for {}",
                        target.canonical
                    ))
                })?;
            latest.into_quote(&target.symbol)
        })
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<RpcTable>,
}

#[derive(Debug, Deserialize)]
struct RpcTable {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
struct DailyRow {
    date: TradeDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    pre_close: Option<f64>,
    change: Option<f64>,
    pct_chg: Option<f64>,
    /// Lots of 100 shares.
    vol: f64,
    /// Thousands of CNY.
    amount: Option<f64>,
}

impl DailyRow {
    fn into_record(self) -> Result<PriceRecord, SourceError> {
        let record = PriceRecord::new(
            self.date,
            self.open,
            self.high,
            self.low,
            self.close,
            (self.vol * 100.0).round().max(0.0) as u64,
        )?
        .with_turnover(self.amount.map(|thousands| thousands * 1_000.0))
        .with_change_pct(self.pct_chg);
        Ok(record)
    }

    fn into_quote(self, symbol: &Symbol) -> Result<Quote, SourceError> {
        let as_of = beijing_close(self.date);
        let mut quote = match (self.change, self.pct_chg, self.pre_close) {
            (Some(change), Some(pct), _) => Quote::new(symbol.clone(), self.close, change, pct, as_of)?,
            (_, _, Some(prev)) => Quote::from_previous_close(symbol.clone(), self.close, prev, as_of)?,
            _ => {
                return Err(SourceError::unavailable(format!(
                    "tushare bar for {} has neither a change nor a previous close",
                    self.date
                )))
            }
        };
        quote.prev_close = self.pre_close;
        Ok(quote.with_session(
            Some(self.open),
            Some(self.high),
            Some(self.low),
            Some((self.vol * 100.0).round().max(0.0) as u64),
        ))
    }
}

/// Classifies an RPC-level error. Tushare reports throttling and permission
/// problems with HTTP 200 and a non-zero code.
fn rpc_error(code: i64, message: &str) -> SourceError {
    let throttled = code == 40203 || message.contains("每分钟") || message.contains("频率");
    if throttled {
        SourceError::rate_limited(format!("tushare throttled the request ({code}): {message}"))
    } else {
        SourceError::unavailable(format!("tushare rejected the request ({code}): {message}"))
    }
}

fn parse_daily(body: &str) -> Result<Vec<DailyRow>, SourceError> {
    let envelope: RpcEnvelope = parse_json(SourceId::Tushare, body)?;
    if envelope.code != 0 {
        return Err(rpc_error(envelope.code, envelope.msg.as_deref().unwrap_or_default()));
    }
    let table = envelope
        .data
        .ok_or_else(|| SourceError::unavailable("tushare response has no data table"))?;

    let column = |name: &str| {
        table
            .fields
            .iter()
            .position(|field| field == name)
            .ok_or_else(|| SourceError::unavailable(format!("tushare table lacks column '{name}'")))
    };
    let (date_col, open_col, high_col, low_col, close_col, vol_col) = (
        column("trade_date")?,
        column("open")?,
        column("high")?,
        column("low")?,
        column("close")?,
        column("vol")?,
    );
    let optional = |name: &str| table.fields.iter().position(|field| field == name);
    let (pre_col, change_col, pct_col, amount_col) = (
        optional("pre_close"),
        optional("change"),
        optional("pct_chg"),
        optional("amount"),
    );

    table
        .items
        .iter()
        .map(|item| -> Result<DailyRow, SourceError> {
            let cell = |index: usize| item.get(index).and_then(json_number);
            let required = |index: usize, name: &str| {
                cell(index).ok_or_else(|| {
                    SourceError::unavailable(format!("tushare row has no numeric '{name}'"))
                })
            };
            let date = item
                .get(date_col)
                .and_then(Value::as_str)
                .ok_or_else(|| SourceError::unavailable("tushare row has no trade_date"))?;

            Ok(DailyRow {
                date: TradeDate::parse_compact(date)?,
                open: required(open_col, "open")?,
                high: required(high_col, "high")?,
                low: required(low_col, "low")?,
                close: required(close_col, "close")?,
                pre_close: pre_col.and_then(cell),
                change: change_col.and_then(cell),
                pct_chg: pct_col.and_then(cell),
                vol: required(vol_col, "vol")?,
                amount: amount_col.and_then(cell),
            })
        })
        .collect()
}
