use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{AccountSnapshot, MarketContext};

/// Upstream regime/volatility/calendar feed. Implementations own their
/// transport; the core wraps every call in a timeout and degrades on error.
#[async_trait]
pub trait MarketContextProvider: Send + Sync {
    async fn market_context(&self) -> Result<MarketContext>;
}

/// Holdings and balances feed.
#[async_trait]
pub trait PositionsProvider: Send + Sync {
    async fn account(&self) -> Result<AccountSnapshot>;
}

struct CachedContext {
    context: MarketContext,
    fetched_at: Instant,
}

/// TTL cache in front of the market-context provider so one cycle burst
/// does not hammer the upstream. On provider failure the last-known
/// context is served; with nothing cached at all a neutral context is
/// returned (missing-source degradation, never a fatal error).
pub struct CachedMarketContext {
    provider: Arc<dyn MarketContextProvider>,
    ttl: Duration,
    call_timeout: Duration,
    cached: tokio::sync::Mutex<Option<CachedContext>>,
}

impl CachedMarketContext {
    pub fn new(
        provider: Arc<dyn MarketContextProvider>,
        ttl: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            ttl,
            call_timeout,
            cached: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn fetch(&self) -> MarketContext {
        let mut guard = self.cached.lock().await;
        if let Some(entry) = guard.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                return entry.context.clone();
            }
        }

        match tokio::time::timeout(self.call_timeout, self.provider.market_context()).await {
            Ok(Ok(context)) => {
                *guard = Some(CachedContext {
                    context: context.clone(),
                    fetched_at: Instant::now(),
                });
                context
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "market context provider failed, using last known");
                self.fallback(guard.as_ref())
            }
            Err(_) => {
                tracing::warn!("market context provider timed out, using last known");
                self.fallback(guard.as_ref())
            }
        }
    }

    fn fallback(&self, cached: Option<&CachedContext>) -> MarketContext {
        match cached {
            Some(entry) => entry.context.clone(),
            None => MarketContext::unknown(chrono::Utc::now().timestamp_millis()),
        }
    }
}

/// Fetch the account snapshot with a bounded timeout; failures degrade to
/// an empty snapshot rather than aborting the cycle.
pub async fn account_or_default(
    provider: &dyn PositionsProvider,
    call_timeout: Duration,
) -> AccountSnapshot {
    match tokio::time::timeout(call_timeout, provider.account()).await {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "positions provider failed, assuming empty account");
            AccountSnapshot::default()
        }
        Err(_) => {
            tracing::warn!("positions provider timed out, assuming empty account");
            AccountSnapshot::default()
        }
    }
}
