//! Market-mode selector.
//!
//! One table keyed by market decides which sources are active and in what
//! order, plus the benchmark indices reported alongside a run. Selection is
//! a pure function of the market tag; credentials and disabled sources are
//! applied later when the registry is built.

use serde::Serialize;

use crate::{ConfigError, Exchange, Market, SourceId, Symbol, ValidationError};

const DOMESTIC_PLAN: &[SourceId] = &[
    SourceId::Eastmoney,
    SourceId::Sina,
    SourceId::Tushare,
    SourceId::Tencent,
    SourceId::Yahoo,
];

const INTERNATIONAL_PLAN: &[SourceId] = &[SourceId::Yahoo];

const DOMESTIC_INDICES: &[MarketIndex] = &[
    MarketIndex::new("000001", Some(Exchange::Shanghai), "Shanghai Composite"),
    MarketIndex::new("399001", Some(Exchange::Shenzhen), "Shenzhen Component"),
    MarketIndex::new("399006", Some(Exchange::Shenzhen), "ChiNext"),
];

const INTERNATIONAL_INDICES: &[MarketIndex] = &[
    MarketIndex::new("^GSPC", None, "S&P 500"),
    MarketIndex::new("^IXIC", None, "Nasdaq Composite"),
    MarketIndex::new("^DJI", None, "Dow Jones Industrial Average"),
];

/// Benchmark index of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarketIndex {
    pub code: &'static str,
    /// Pinned venue; index codes collide with stock codes across exchanges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<Exchange>,
    pub name: &'static str,
}

impl MarketIndex {
    const fn new(code: &'static str, exchange: Option<Exchange>, name: &'static str) -> Self {
        Self {
            code,
            exchange,
            name,
        }
    }

    /// Validated symbol for fetching the index through the regular sources.
    pub fn symbol(&self, market: Market) -> Result<Symbol, ValidationError> {
        match self.exchange {
            Some(exchange) => Symbol::parse(&format!("{}{}", exchange.prefix(), self.code), market),
            None => Symbol::parse(self.code, market),
        }
    }
}

/// Active source ordering and index set for one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarketMode {
    pub market: Market,
    pub sources: &'static [SourceId],
    pub indices: &'static [MarketIndex],
}

impl MarketMode {
    pub const fn for_market(market: Market) -> Self {
        match market {
            Market::Domestic => Self {
                market,
                sources: DOMESTIC_PLAN,
                indices: DOMESTIC_INDICES,
            },
            Market::International => Self {
                market,
                sources: INTERNATIONAL_PLAN,
                indices: INTERNATIONAL_INDICES,
            },
        }
    }

    /// Resolves an operator-supplied tag such as `cn` or `us`.
    pub fn select(tag: &str) -> Result<Self, ConfigError> {
        Market::from_tag(tag).map(Self::for_market)
    }

    /// Priority rank of `source` in this market, if it is active here.
    pub fn rank_of(&self, source: SourceId) -> Option<u8> {
        self.sources
            .iter()
            .position(|candidate| *candidate == source)
            .and_then(|rank| u8::try_from(rank).ok())
    }

    pub fn index_symbols(&self) -> Result<Vec<Symbol>, ValidationError> {
        self.indices
            .iter()
            .map(|index| index.symbol(self.market))
            .collect()
    }
}
