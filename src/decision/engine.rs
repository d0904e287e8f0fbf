use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;

use crate::config::DecisionConfig;
use crate::events::{CoreEvent, EventSender};
use crate::model::PositionSnapshot;

use super::{
    combine_scores, CandidateRequest, Decision, DecisionAction, DecisionCache, DecisionRejectCode,
    ScoreSource, SourceScore,
};

const MS_PER_DAY: i64 = 86_400_000;

/// Snapshot of system health consulted before any scoring work.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHealth {
    pub breaker_open: bool,
    pub capital_utilization_pct: f64,
    pub market_data_age_ms: u64,
    pub open_positions: usize,
}

pub trait HealthProbe: Send + Sync {
    fn health(&self) -> SystemHealth;
}

/// Shared health cell: written by the orchestrator each cycle, read by the
/// decision engine on every evaluation.
#[derive(Default)]
pub struct SharedHealth {
    inner: Mutex<SystemHealth>,
}

impl SharedHealth {
    pub fn set(&self, health: SystemHealth) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = health;
        }
    }
}

impl HealthProbe for SharedHealth {
    fn health(&self) -> SystemHealth {
        self.inner.lock().map(|g| *g).unwrap_or_default()
    }
}

pub struct DecisionEngine {
    config: DecisionConfig,
    cache: DecisionCache,
    sources: Vec<Arc<dyn ScoreSource>>,
    health: Arc<dyn HealthProbe>,
    events: EventSender,
    source_timeout: Duration,
}

impl DecisionEngine {
    pub fn new(
        config: DecisionConfig,
        sources: Vec<Arc<dyn ScoreSource>>,
        health: Arc<dyn HealthProbe>,
        events: EventSender,
        source_timeout: Duration,
    ) -> Self {
        let cache = DecisionCache::new(Duration::from_millis(config.cache_ttl_ms));
        Self {
            config,
            cache,
            sources,
            health,
            events,
            source_timeout,
        }
    }

    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    /// Score one trade candidate and produce a final action.
    ///
    /// Never returns `Err`: internal faults surface as an `Error`-kind
    /// decision, and `Error`/`Reject`/`Hold` are all non-actionable.
    pub async fn evaluate(&self, req: CandidateRequest) -> Decision {
        let key = req.key();
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(
                symbol = %req.symbol,
                strategy = %req.strategy_id,
                "decision cache hit"
            );
            return cached;
        }

        let decision = match self.evaluate_uncached(&req).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(symbol = %req.symbol, error = %e, "decision evaluation failed");
                Decision::internal_error(&req, format!("{e:#}"))
            }
        };

        self.cache.put(key, decision.clone());
        let _ = self.events.send(CoreEvent::DecisionMade(decision.clone()));
        decision
    }

    async fn evaluate_uncached(&self, req: &CandidateRequest) -> Result<Decision> {
        if let Some(reject) = self.health_precheck(req) {
            return Ok(reject);
        }

        let sub_scores = self.gather_sub_scores(req).await;
        let combined = combine_scores(&sub_scores);
        let mut reasons = Vec::new();

        let (action, score) = match (req.requested, req.position.as_ref()) {
            (super::RequestedAction::Exit, Some(position)) => {
                self.evaluate_exit(combined, position, &mut reasons)
            }
            _ => {
                if req.has_position {
                    // Held symbols never add exposure: dampening biases
                    // toward inaction and only the sell side applies.
                    let score = combined * self.config.position_dampening;
                    reasons.push(format!(
                        "position held: dampened {:.3} -> {:.3}",
                        combined, score
                    ));
                    let action = if score <= self.config.sell_threshold {
                        DecisionAction::Sell
                    } else {
                        DecisionAction::Hold
                    };
                    (action, score)
                } else {
                    (self.action_for_score(combined), combined)
                }
            }
        };

        let action = if action == DecisionAction::Buy {
            match self.validate_buy(req) {
                Ok(()) => action,
                Err(reason) => {
                    reasons.push(reason);
                    return Ok(Decision {
                        symbol: req.symbol.clone(),
                        strategy_id: req.strategy_id.clone(),
                        requested: req.requested,
                        action: DecisionAction::Reject,
                        score,
                        sub_scores,
                        reasons,
                        created_at_ms: chrono::Utc::now().timestamp_millis(),
                    });
                }
            }
        } else {
            action
        };

        reasons.push(format!(
            "score {:.3} vs buy>={:.2} sell<={:.2}",
            score, self.config.buy_threshold, self.config.sell_threshold
        ));

        Ok(Decision {
            symbol: req.symbol.clone(),
            strategy_id: req.strategy_id.clone(),
            requested: req.requested,
            action,
            score,
            sub_scores,
            reasons,
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        })
    }

    /// Circuit breaker, capital exhaustion, and stale data all short-circuit
    /// to a rejection before any scoring work happens.
    fn health_precheck(&self, req: &CandidateRequest) -> Option<Decision> {
        let health = self.health.health();
        if health.breaker_open {
            return Some(Decision::reject(
                req,
                DecisionRejectCode::BreakerOpen,
                "circuit breaker open".to_string(),
            ));
        }
        if health.capital_utilization_pct > self.config.max_capital_utilization_pct {
            return Some(Decision::reject(
                req,
                DecisionRejectCode::CapitalExhausted,
                format!(
                    "capital utilization {:.1}% above {:.1}%",
                    health.capital_utilization_pct, self.config.max_capital_utilization_pct
                ),
            ));
        }
        if health.market_data_age_ms > self.config.max_data_age_ms {
            return Some(Decision::reject(
                req,
                DecisionRejectCode::MarketDataStale,
                format!(
                    "market data {}ms old, limit {}ms",
                    health.market_data_age_ms, self.config.max_data_age_ms
                ),
            ));
        }
        None
    }

    /// Query every configured source; a timeout or error leaves a neutral
    /// placeholder and never aborts the decision.
    async fn gather_sub_scores(&self, req: &CandidateRequest) -> Vec<SourceScore> {
        let mut sub_scores = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let kind = source.kind();
            let outcome = tokio::time::timeout(self.source_timeout, source.score(req)).await;
            let sub = match outcome {
                Ok(Ok(value)) => SourceScore::available(kind, value),
                Ok(Err(e)) => {
                    tracing::warn!(source = kind.as_str(), error = %e, "score source failed");
                    SourceScore::unavailable(kind, format!("failed: {e:#}"))
                }
                Err(_) => {
                    tracing::warn!(source = kind.as_str(), "score source timed out");
                    SourceScore::unavailable(kind, "timed out")
                }
            };
            sub_scores.push(sub);
        }
        sub_scores
    }

    /// Exit evaluation for held positions: winners and losers exit below
    /// their respective thresholds, and stale positions decay toward exit.
    fn evaluate_exit(
        &self,
        combined: f64,
        position: &PositionSnapshot,
        reasons: &mut Vec<String>,
    ) -> (DecisionAction, f64) {
        let mut score = combined;
        let now_ms = chrono::Utc::now().timestamp_millis();
        let age_days = (now_ms - position.opened_at_ms) / MS_PER_DAY;
        if age_days > self.config.stale_position_days as i64 {
            score *= self.config.stale_position_decay;
            reasons.push(format!(
                "position {} days old: score decayed to {:.3}",
                age_days, score
            ));
        }

        let pnl_pct = position.unrealized_pnl_pct;
        if pnl_pct > self.config.exit_profit_trigger_pct
            && score < self.config.exit_winner_threshold
        {
            reasons.push(format!(
                "winner exit: +{:.2}% with score {:.3} < {:.2}",
                pnl_pct, score, self.config.exit_winner_threshold
            ));
            return (DecisionAction::Sell, score);
        }
        if pnl_pct < -self.config.exit_loss_trigger_pct && score < self.config.exit_loser_threshold
        {
            reasons.push(format!(
                "loser exit: {:.2}% with score {:.3} < {:.2}",
                pnl_pct, score, self.config.exit_loser_threshold
            ));
            return (DecisionAction::Sell, score);
        }
        reasons.push("exit conditions not met".to_string());
        (DecisionAction::Hold, score)
    }

    fn action_for_score(&self, score: f64) -> DecisionAction {
        if score >= self.config.buy_threshold {
            DecisionAction::Buy
        } else if score <= self.config.sell_threshold {
            DecisionAction::Sell
        } else {
            DecisionAction::Hold
        }
    }

    /// Risk validation for buys. Position count is enforced; symbol and
    /// sector concentration hooks are permissive until the account feed
    /// exposes sector tags.
    fn validate_buy(&self, req: &CandidateRequest) -> Result<(), String> {
        let health = self.health.health();
        if health.open_positions >= self.config.max_open_positions {
            return Err(format!(
                "{}: {} open positions at limit {}",
                DecisionRejectCode::MaxPositionsReached.as_str(),
                health.open_positions,
                self.config.max_open_positions
            ));
        }
        if !self.symbol_concentration_ok(&req.symbol) {
            return Err("risk.symbol_concentration".to_string());
        }
        if !self.sector_concentration_ok(&req.symbol) {
            return Err("risk.sector_concentration".to_string());
        }
        Ok(())
    }

    fn symbol_concentration_ok(&self, _symbol: &str) -> bool {
        true
    }

    fn sector_concentration_ok(&self, _symbol: &str) -> bool {
        true
    }
}
