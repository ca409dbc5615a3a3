//! Per-market ordered source registry.
//!
//! The registry is assembled once at startup and is read-only afterwards;
//! the coordinator and batch workers share it through an `Arc`.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::adapters::{EastmoneySource, SinaSource, TencentSource, TushareSource, YahooSource};
use crate::data_source::{CapabilitySet, DataSource, Endpoint};
use crate::http_client::HttpClient;
use crate::market_mode::MarketMode;
use crate::retry::RetryConfig;
use crate::source_policy::SourcePolicy;
use crate::{ConfigError, FetchSettings, Market, SourceCredentials, SourceId};

const TUSHARE_TOKEN_HINT: &str = "set STOCKPULSE_TUSHARE_TOKEN or disable the source";

/// Static facts about one registered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceDescriptor {
    /// Position in the failover order; lower is tried first.
    pub rank: u8,
    pub id: SourceId,
    pub markets: &'static [Market],
    pub capabilities: CapabilitySet,
    pub requires_credentials: bool,
}

/// Descriptor paired with the live fetcher.
#[derive(Clone)]
pub struct RegisteredSource {
    descriptor: SourceDescriptor,
    source: Arc<dyn DataSource>,
}

impl RegisteredSource {
    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }
}

/// Ordered, validated source list for one market.
#[derive(Clone)]
pub struct SourceRegistry {
    market: Market,
    entries: Vec<RegisteredSource>,
}

impl SourceRegistry {
    /// Builds the production sources for `mode`, skipping disabled ones.
    ///
    /// Ranks come from the market table, so disabling a source leaves gaps
    /// but never reorders the rest.
    pub fn standard(
        mode: &MarketMode,
        settings: &FetchSettings,
        credentials: &SourceCredentials,
        http: Arc<dyn HttpClient>,
    ) -> Result<Self, ConfigError> {
        let mut ranked = Vec::with_capacity(mode.sources.len());
        for (position, id) in mode.sources.iter().copied().enumerate() {
            if settings.is_disabled(id) {
                debug!(source = %id, market = %mode.market, "source disabled by configuration");
                continue;
            }
            let rank = rank_from_position(position)?;
            let policy = policy_for(id, settings);
            let source: Arc<dyn DataSource> = match id {
                SourceId::Eastmoney => Arc::new(EastmoneySource::with_policy(policy, Arc::clone(&http))),
                SourceId::Sina => Arc::new(SinaSource::with_policy(policy, Arc::clone(&http))),
                SourceId::Tushare => {
                    let token =
                        credentials
                            .tushare_token()
                            .ok_or(ConfigError::MissingCredential {
                                source_name: SourceId::Tushare.as_str(),
                                hint: TUSHARE_TOKEN_HINT,
                            })?;
                    Arc::new(TushareSource::with_policy(token, policy, Arc::clone(&http)))
                }
                SourceId::Tencent => Arc::new(TencentSource::with_policy(policy, Arc::clone(&http))),
                SourceId::Yahoo => Arc::new(YahooSource::with_policy(policy, Arc::clone(&http))),
            };
            ranked.push((rank, source));
        }

        Self::from_ranked(mode.market, ranked)
    }

    /// Assembles a registry from arbitrary fetchers, ranked by position.
    pub fn from_sources(
        market: Market,
        sources: Vec<Arc<dyn DataSource>>,
    ) -> Result<Self, ConfigError> {
        let ranked = sources
            .into_iter()
            .enumerate()
            .map(|(position, source)| rank_from_position(position).map(|rank| (rank, source)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_ranked(market, ranked)
    }

    /// Assembles a registry from explicitly ranked fetchers.
    pub fn from_ranked(
        market: Market,
        mut ranked: Vec<(u8, Arc<dyn DataSource>)>,
    ) -> Result<Self, ConfigError> {
        if ranked.is_empty() {
            return Err(ConfigError::NoSources {
                market: market.as_str(),
            });
        }
        ranked.sort_by_key(|(rank, _)| *rank);

        let mut ranks = HashSet::with_capacity(ranked.len());
        let mut ids = HashSet::with_capacity(ranked.len());
        let mut entries = Vec::with_capacity(ranked.len());
        for (rank, source) in ranked {
            let profile = source.profile();
            if !ranks.insert(rank) {
                return Err(ConfigError::DuplicateRank {
                    rank,
                    market: market.as_str(),
                });
            }
            if !ids.insert(profile.id) {
                return Err(ConfigError::DuplicateSource {
                    source_name: profile.id.as_str(),
                    market: market.as_str(),
                });
            }
            if !profile.serves(market) {
                return Err(ConfigError::UnsupportedMarket {
                    source_name: profile.id.as_str(),
                    market: market.as_str(),
                });
            }

            entries.push(RegisteredSource {
                descriptor: SourceDescriptor {
                    rank,
                    id: profile.id,
                    markets: profile.markets,
                    capabilities: profile.capabilities,
                    requires_credentials: profile.requires_credentials,
                },
                source,
            });
        }

        Ok(Self { market, entries })
    }

    pub const fn market(&self) -> Market {
        self.market
    }

    /// Sources in failover order.
    pub fn entries(&self) -> &[RegisteredSource] {
        &self.entries
    }

    pub fn descriptors(&self) -> Vec<SourceDescriptor> {
        self.entries.iter().map(|entry| entry.descriptor).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any active source declares `endpoint`.
    pub fn supports(&self, endpoint: Endpoint) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.descriptor.capabilities.supports(endpoint))
    }
}

fn rank_from_position(position: usize) -> Result<u8, ConfigError> {
    u8::try_from(position).map_err(|_| ConfigError::InvalidSetting {
        field: "sources",
        reason: format!("at most {} sources per market", u8::MAX),
    })
}

fn policy_for(id: SourceId, settings: &FetchSettings) -> SourcePolicy {
    let policy = SourcePolicy::default_for(id);
    match settings.max_retries {
        Some(retries) => policy.with_retry(RetryConfig::exponential(retries)),
        None => policy,
    }
}
