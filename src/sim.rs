//! Stand-in providers so the binary runs without live upstream feeds.
//!
//! Real deployments wire broker and data connectors behind the same traits;
//! these produce plausible, slowly drifting values for local runs.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::decision::{CandidateRequest, ScoreSource, ScoreSourceKind};
use crate::market::{MarketContextProvider, PositionsProvider};
use crate::model::{AccountSnapshot, CalendarEvent, CalendarEventKind, MarketContext, MarketRegime};

pub struct SimMarketData {
    state: Mutex<SimMarketState>,
}

struct SimMarketState {
    rng: StdRng,
    vix: f64,
    regime: MarketRegime,
}

impl SimMarketData {
    pub fn new(seed: u64) -> Self {
        Self {
            state: Mutex::new(SimMarketState {
                rng: StdRng::seed_from_u64(seed),
                vix: 18.0,
                regime: MarketRegime::Trending,
            }),
        }
    }
}

#[async_trait]
impl MarketContextProvider for SimMarketData {
    async fn market_context(&self) -> Result<MarketContext> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("sim market state poisoned"))?;
        let step: f64 = state.rng.gen_range(-1.5..1.5);
        state.vix = (state.vix + step).clamp(10.0, 45.0);
        state.regime = if state.vix > 30.0 {
            MarketRegime::Volatile
        } else if state.vix > 20.0 {
            MarketRegime::Choppy
        } else {
            MarketRegime::Trending
        };
        let now_ms = chrono::Utc::now().timestamp_millis();
        Ok(MarketContext {
            regime: state.regime,
            vix: state.vix,
            trend_strength: state.rng.gen_range(0.2..0.9),
            portfolio_return_pct: state.rng.gen_range(-1.0..1.0),
            data_age_ms: 250,
            calendar: vec![CalendarEvent {
                kind: CalendarEventKind::Earnings,
                symbol: Some("AAPL".to_string()),
                scheduled_at_ms: now_ms + 6 * 3_600_000,
            }],
            captured_at_ms: now_ms,
        })
    }
}

pub struct SimAccount;

#[async_trait]
impl PositionsProvider for SimAccount {
    async fn account(&self) -> Result<AccountSnapshot> {
        Ok(AccountSnapshot {
            positions: Vec::new(),
            equity_usd: 250_000.0,
            capital_utilization_pct: 35.0,
        })
    }
}

/// Deterministic pseudo-score keyed on symbol bytes plus a per-source bias.
pub struct SimScoreSource {
    kind: ScoreSourceKind,
    bias: f64,
}

impl SimScoreSource {
    pub fn new(kind: ScoreSourceKind, bias: f64) -> Self {
        Self { kind, bias }
    }
}

#[async_trait]
impl ScoreSource for SimScoreSource {
    fn kind(&self) -> ScoreSourceKind {
        self.kind
    }

    async fn score(&self, req: &CandidateRequest) -> Result<f64> {
        let seed: u32 = req.symbol.bytes().map(u32::from).sum();
        let mut base = 0.35 + ((seed % 31) as f64) / 100.0;
        // The strategy source averages in the candidate's own signal when
        // one was supplied with the request.
        if self.kind == ScoreSourceKind::Strategy {
            if let Some(signal) = req.candidate_signal {
                base = (base + signal.clamp(0.0, 1.0)) / 2.0;
            }
        }
        Ok((base + self.bias).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::RequestedAction;

    fn request(signal: Option<f64>) -> CandidateRequest {
        CandidateRequest {
            symbol: "NVDA".to_string(),
            requested: RequestedAction::Buy,
            strategy_id: "strat-test".to_string(),
            has_position: false,
            position: None,
            candidate_signal: signal,
        }
    }

    #[tokio::test]
    /// Verifies the strategy source folds a supplied candidate signal into
    /// its score while other source kinds ignore it.
    async fn strategy_source_folds_candidate_signal() {
        let strategy = SimScoreSource::new(ScoreSourceKind::Strategy, 0.0);
        let plain = strategy.score(&request(None)).await.unwrap();
        let boosted = strategy.score(&request(Some(1.0))).await.unwrap();
        assert!((boosted - (plain + 1.0) / 2.0).abs() < 1e-9);

        let model = SimScoreSource::new(ScoreSourceKind::Model, 0.0);
        let without = model.score(&request(None)).await.unwrap();
        let with = model.score(&request(Some(1.0))).await.unwrap();
        assert!((without - with).abs() < 1e-9);
    }

    #[tokio::test]
    /// Verifies out-of-range candidate signals are clamped before averaging.
    async fn candidate_signal_is_clamped() {
        let strategy = SimScoreSource::new(ScoreSourceKind::Strategy, 0.0);
        let at_cap = strategy.score(&request(Some(1.0))).await.unwrap();
        let over = strategy.score(&request(Some(7.5))).await.unwrap();
        assert!((at_cap - over).abs() < 1e-9);
    }
}
