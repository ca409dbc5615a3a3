use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::RetryConfig;
use crate::SourceId;

/// Per-source request budget and resilience settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePolicy {
    pub source_id: SourceId,
    pub quota_window: Duration,
    pub quota_limit: u32,
    /// Timeout applied to each individual HTTP request.
    pub request_timeout: Duration,
    pub retry: RetryConfig,
    pub breaker: CircuitBreakerConfig,
}

impl SourcePolicy {
    fn with_quota(source_id: SourceId, quota_limit: u32) -> Self {
        Self {
            source_id,
            quota_window: Duration::from_secs(60),
            quota_limit,
            request_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }

    /// Eastmoney bans aggressive scrapers; keep the budget low.
    pub fn eastmoney_default() -> Self {
        Self::with_quota(SourceId::Eastmoney, 30)
    }

    pub fn sina_default() -> Self {
        Self::with_quota(SourceId::Sina, 60)
    }

    /// Tushare's entry-level plan allows a few hundred calls per minute.
    pub fn tushare_default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            ..Self::with_quota(SourceId::Tushare, 120)
        }
    }

    pub fn tencent_default() -> Self {
        Self::with_quota(SourceId::Tencent, 60)
    }

    pub fn yahoo_default() -> Self {
        Self {
            retry: RetryConfig::exponential(1),
            ..Self::with_quota(SourceId::Yahoo, 30)
        }
    }

    pub fn default_for(source_id: SourceId) -> Self {
        match source_id {
            SourceId::Eastmoney => Self::eastmoney_default(),
            SourceId::Sina => Self::sina_default(),
            SourceId::Tushare => Self::tushare_default(),
            SourceId::Tencent => Self::tencent_default(),
            SourceId::Yahoo => Self::yahoo_default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_quota_limit(mut self, quota_limit: u32) -> Self {
        self.quota_limit = quota_limit;
        self
    }
}
