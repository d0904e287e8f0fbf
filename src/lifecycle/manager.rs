use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};

use crate::config::LifecycleConfig;
use crate::error::AppError;
use crate::model::{
    ParamValue, PerformanceSnapshot, PromotionCriteria, StrategyFamily, StrategyRecord,
    StrategyStatus, TournamentStage, TransitionDirection, TransitionReason, TransitionRecord,
    R2_CAPITAL_FLOOR_USD, R3_CAPITAL_FLOOR_USD,
};

use super::store::StrategyStore;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Owns every stage/status transition of the roster.
///
/// Concurrent updates to the same strategy serialize on a per-key async
/// mutex; different strategies proceed in parallel. The store is the source
/// of truth; nothing is cached here between calls.
pub struct StrategyLifecycleManager {
    store: Arc<dyn StrategyStore>,
    config: LifecycleConfig,
    r1_allocation_usd: f64,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl StrategyLifecycleManager {
    pub fn new(store: Arc<dyn StrategyStore>, config: LifecycleConfig, r1_allocation_usd: f64) -> Self {
        Self {
            store,
            config,
            r1_allocation_usd,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn default_criteria(&self) -> PromotionCriteria {
        self.config.promotion.unwrap_or_default()
    }

    fn key_lock(&self, id: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut guard = self
            .locks
            .lock()
            .map_err(|_| anyhow::anyhow!("lifecycle lock table poisoned"))?;
        Ok(guard
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    /// Create a strategy in paper R1.
    pub fn register(
        &self,
        label: impl Into<String>,
        family: StrategyFamily,
        params: BTreeMap<String, ParamValue>,
        exploration: bool,
        criteria: Option<PromotionCriteria>,
    ) -> Result<StrategyRecord> {
        let mut record =
            StrategyRecord::new_paper(label, family, params, self.r1_allocation_usd);
        record.promotion_criteria = criteria.unwrap_or_else(|| self.default_criteria());
        record.exploration = exploration;
        self.store
            .upsert(&record)
            .context("failed to persist new strategy")?;
        tracing::info!(
            strategy = %record.id,
            family = record.family.as_str(),
            exploration,
            "registered paper strategy"
        );
        Ok(record)
    }

    pub fn roster(&self) -> Result<Vec<StrategyRecord>> {
        self.store.load_all()
    }

    pub fn transitions(&self) -> Result<Vec<TransitionRecord>> {
        self.store.transitions()
    }

    pub fn check_promotion_criteria(&self, record: &StrategyRecord) -> bool {
        record.promotion_criteria.is_met(&record.performance)
    }

    /// Merge a fresh performance snapshot. Paper strategies that now satisfy
    /// every criterion are promoted in the same serialized section; live
    /// strategies that hit the demotion rules are demoted.
    pub async fn update_performance(
        &self,
        id: &str,
        performance: PerformanceSnapshot,
    ) -> Result<StrategyRecord> {
        let lock = self.key_lock(id)?;
        let _guard = lock.lock().await;

        let mut record = self.load_required(id)?;
        record.performance = performance;

        match record.status {
            StrategyStatus::Paper => {
                // Earlier rounds advance one capital band per orchestrator
                // cycle; only the final paper round auto-promotes to live.
                if !record.archived
                    && record.stage() == TournamentStage::R3
                    && record.promotion_criteria.is_met(&record.performance)
                {
                    return self.promote_locked(record, TransitionReason::Automatic);
                }
            }
            StrategyStatus::Live => {
                if let Some(why) = self.auto_demotion_reason(&record.performance) {
                    tracing::warn!(strategy = %record.id, reason = %why, "auto demotion");
                    return self.demote_locked(record, TransitionReason::Automatic);
                }
            }
        }

        self.store
            .upsert(&record)
            .context("failed to persist performance update")?;
        Ok(record)
    }

    /// Paper -> live. Every promotion criterion must hold; partial credit is
    /// never given.
    pub async fn promote(&self, id: &str, reason: TransitionReason) -> Result<StrategyRecord> {
        let lock = self.key_lock(id)?;
        let _guard = lock.lock().await;
        let record = self.load_required(id)?;
        if record.status != StrategyStatus::Paper {
            return Err(AppError::InvalidTransition {
                id: id.to_string(),
                msg: "not in paper status".to_string(),
            }
            .into());
        }
        if !record.promotion_criteria.is_met(&record.performance) {
            return Err(AppError::InvalidTransition {
                id: id.to_string(),
                msg: "promotion criteria not met".to_string(),
            }
            .into());
        }
        self.promote_locked(record, reason)
    }

    /// Advance a paper strategy one capital round (R1 -> R2 or R2 -> R3).
    pub async fn advance_round(&self, id: &str) -> Result<StrategyRecord> {
        let lock = self.key_lock(id)?;
        let _guard = lock.lock().await;
        let mut record = self.load_required(id)?;
        if record.status != StrategyStatus::Paper {
            return Err(AppError::InvalidTransition {
                id: id.to_string(),
                msg: "not in paper status".to_string(),
            }
            .into());
        }
        if !record.promotion_criteria.is_met(&record.performance) {
            return Err(AppError::InvalidTransition {
                id: id.to_string(),
                msg: "promotion criteria not met".to_string(),
            }
            .into());
        }
        let next_capital = match record.stage() {
            TournamentStage::R1 => R2_CAPITAL_FLOOR_USD,
            TournamentStage::R2 => R3_CAPITAL_FLOOR_USD,
            stage => bail!("strategy {id} cannot advance from stage {}", stage.as_str()),
        };
        record.allocated_capital_usd = next_capital;
        self.persist_transition(
            &record,
            TransitionDirection::Promote,
            TransitionReason::Automatic,
        )?;
        tracing::info!(
            strategy = %record.id,
            stage = record.stage().as_str(),
            "advanced tournament round"
        );
        Ok(record)
    }

    /// Live -> paper, automatic or operator-initiated. The strategy returns
    /// to the R1 capital band; its history is retained.
    pub async fn demote(&self, id: &str, reason: TransitionReason) -> Result<StrategyRecord> {
        let lock = self.key_lock(id)?;
        let _guard = lock.lock().await;
        let record = self.load_required(id)?;
        if record.status != StrategyStatus::Live {
            return Err(AppError::InvalidTransition {
                id: id.to_string(),
                msg: "not live".to_string(),
            }
            .into());
        }
        self.demote_locked(record, reason)
    }

    /// Mark a strategy archived; records are never physically deleted.
    pub async fn archive(&self, id: &str) -> Result<StrategyRecord> {
        let lock = self.key_lock(id)?;
        let _guard = lock.lock().await;
        let mut record = self.load_required(id)?;
        record.archived = true;
        self.store
            .upsert(&record)
            .context("failed to persist archive")?;
        Ok(record)
    }

    /// Demotion rules for live strategies: any single rule suffices.
    pub fn auto_demotion_reason(&self, perf: &PerformanceSnapshot) -> Option<String> {
        if perf.trade_count == 0 {
            return None;
        }
        if perf.sharpe < self.config.demote_sharpe_below {
            return Some(format!(
                "sharpe {:.2} below {:.2}",
                perf.sharpe, self.config.demote_sharpe_below
            ));
        }
        if perf.max_drawdown_pct > self.config.demote_drawdown_above_pct {
            return Some(format!(
                "drawdown {:.1}% above {:.1}%",
                perf.max_drawdown_pct, self.config.demote_drawdown_above_pct
            ));
        }
        if perf.trade_count >= self.config.demote_min_trades
            && perf.win_rate_pct < self.config.demote_win_rate_below_pct
        {
            return Some(format!(
                "win rate {:.1}% below {:.1}% over {} trades",
                perf.win_rate_pct, self.config.demote_win_rate_below_pct, perf.trade_count
            ));
        }
        None
    }

    fn load_required(&self, id: &str) -> Result<StrategyRecord> {
        self.store
            .get(id)?
            .ok_or_else(|| AppError::UnknownStrategy(id.to_string()).into())
    }

    fn promote_locked(
        &self,
        mut record: StrategyRecord,
        reason: TransitionReason,
    ) -> Result<StrategyRecord> {
        record.status = StrategyStatus::Live;
        record.promoted_at_ms = Some(now_ms());
        self.persist_transition(&record, TransitionDirection::Promote, reason)?;
        tracing::info!(strategy = %record.id, "promoted to live");
        Ok(record)
    }

    fn demote_locked(
        &self,
        mut record: StrategyRecord,
        reason: TransitionReason,
    ) -> Result<StrategyRecord> {
        record.status = StrategyStatus::Paper;
        record.demoted_at_ms = Some(now_ms());
        record.allocated_capital_usd = self.r1_allocation_usd;
        self.persist_transition(&record, TransitionDirection::Demote, reason)?;
        tracing::info!(strategy = %record.id, "demoted to paper");
        Ok(record)
    }

    /// A failed transition write must never pass as success: the roster
    /// upsert surfaces immediately, the log append gets one retry before the
    /// error propagates to the caller.
    fn persist_transition(
        &self,
        record: &StrategyRecord,
        direction: TransitionDirection,
        reason: TransitionReason,
    ) -> Result<()> {
        self.store
            .upsert(record)
            .with_context(|| format!("failed to persist {} transition", direction.as_str()))?;

        let entry = TransitionRecord {
            strategy_id: record.id.clone(),
            direction,
            at_ms: now_ms(),
            performance: record.performance,
            reason,
        };
        if let Err(first) = self.store.append_transition(&entry) {
            tracing::warn!(
                strategy = %record.id,
                error = %first,
                "transition log append failed, retrying once"
            );
            self.store
                .append_transition(&entry)
                .with_context(|| format!("failed to log {} transition", direction.as_str()))?;
        }
        Ok(())
    }
}
