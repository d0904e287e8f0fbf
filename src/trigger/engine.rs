use crate::config::TriggerConfig;
use crate::model::{
    stage_for, CapacitySnapshot, MarketContext, MarketRegime, StrategyRecord, StrategyStatus,
    TournamentStage,
};

use super::RosterNeeds;

/// Tagged outcome of one trigger class. Findings are merged into
/// [`RosterNeeds`] by an explicit reducer: spawn counts by maximum, demote
/// ids by union, booleans by OR.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerFinding {
    Capacity { spawn_r1: u32 },
    Decay { demote: Vec<String> },
    RegimeChange { spawn_r1: u32 },
    EventDriven { spawn_r1: u32 },
    Drift,
    Novelty { spawn_exploration: u32 },
}

impl TriggerFinding {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Capacity { .. } => "capacity",
            Self::Decay { .. } => "decay",
            Self::RegimeChange { .. } => "regime_change",
            Self::EventDriven { .. } => "event_driven",
            Self::Drift => "drift",
            Self::Novelty { .. } => "novelty",
        }
    }
}

/// Debounces regime flips: a new regime label must persist for the
/// configured window before the regime-change trigger may fire once.
#[derive(Debug, Clone)]
pub struct RegimeTracker {
    confirmed: MarketRegime,
    pending: Option<(MarketRegime, i64)>,
}

impl Default for RegimeTracker {
    fn default() -> Self {
        Self {
            confirmed: MarketRegime::Unknown,
            pending: None,
        }
    }
}

impl RegimeTracker {
    pub fn confirmed(&self) -> MarketRegime {
        self.confirmed
    }

    /// Record an observation; returns `true` exactly when a new regime has
    /// persisted past the window and becomes confirmed.
    pub fn observe(&mut self, regime: MarketRegime, now_ms: i64, persistence_ms: i64) -> bool {
        if regime == self.confirmed {
            self.pending = None;
            return false;
        }
        match self.pending {
            Some((pending, since_ms)) if pending == regime => {
                if now_ms.saturating_sub(since_ms) >= persistence_ms {
                    self.confirmed = regime;
                    self.pending = None;
                    true
                } else {
                    false
                }
            }
            _ => {
                self.pending = Some((regime, now_ms));
                false
            }
        }
    }
}

pub struct TriggerEngine {
    config: TriggerConfig,
    regime: RegimeTracker,
}

impl TriggerEngine {
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            regime: RegimeTracker::default(),
        }
    }

    /// Evaluate all six trigger classes plus the tournament-advancement scan
    /// and merge the findings into one needs object.
    pub fn evaluate(
        &mut self,
        ctx: &MarketContext,
        roster: &[StrategyRecord],
        capacity: &CapacitySnapshot,
    ) -> RosterNeeds {
        let findings = [
            self.capacity_trigger(capacity),
            self.decay_trigger(roster),
            self.regime_change_trigger(ctx, capacity),
            self.event_trigger(ctx, capacity),
            self.drift_trigger(roster),
            self.novelty_trigger(roster, capacity),
        ];

        let mut needs = RosterNeeds::default();
        for finding in findings.into_iter().flatten() {
            needs.triggers_fired.push(finding.name().to_string());
            match finding {
                TriggerFinding::Capacity { spawn_r1 }
                | TriggerFinding::RegimeChange { spawn_r1 }
                | TriggerFinding::EventDriven { spawn_r1 } => {
                    needs.spawn_r1 = needs.spawn_r1.max(spawn_r1);
                }
                TriggerFinding::Decay { demote } => {
                    for id in demote {
                        if !needs.demote.contains(&id) {
                            needs.demote.push(id);
                        }
                    }
                }
                TriggerFinding::Drift => needs.reseed_families = true,
                TriggerFinding::Novelty { spawn_exploration } => {
                    needs.spawn_exploration = needs.spawn_exploration.max(spawn_exploration);
                }
            }
        }

        self.advancement_scan(roster, &mut needs);

        tracing::debug!(
            spawn_r1 = needs.spawn_r1,
            spawn_exploration = needs.spawn_exploration,
            demote = needs.demote.len(),
            reseed = needs.reseed_families,
            fired = ?needs.triggers_fired,
            "trigger evaluation complete"
        );
        needs
    }

    /// Spawn while paper budget or roster slots sit under their utilization
    /// floors, bounded by the free slots.
    fn capacity_trigger(&self, capacity: &CapacitySnapshot) -> Option<TriggerFinding> {
        let free = capacity.free_slots();
        if free == 0 {
            return None;
        }
        let budget_low = capacity.budget_utilization_pct() < self.config.budget_spawn_below_pct;
        let slots_low = capacity.slot_utilization_pct() < self.config.slot_spawn_below_pct;
        if !budget_low && !slots_low {
            return None;
        }
        let want = if budget_low && slots_low { 3 } else { 1 };
        Some(TriggerFinding::Capacity {
            spawn_r1: want.min(free),
        })
    }

    /// Flag live strategies whose trailing Sharpe decayed below the floor.
    fn decay_trigger(&self, roster: &[StrategyRecord]) -> Option<TriggerFinding> {
        let demote: Vec<String> = roster
            .iter()
            .filter(|s| {
                s.is_live()
                    && s.performance.trade_count > 0
                    && s.performance.sharpe < self.config.decay_sharpe_threshold
            })
            .map(|s| s.id.clone())
            .collect();
        if demote.is_empty() {
            None
        } else {
            Some(TriggerFinding::Decay { demote })
        }
    }

    /// Spawn a fresh cohort when a regime flip has persisted past the
    /// debounce window.
    fn regime_change_trigger(
        &mut self,
        ctx: &MarketContext,
        capacity: &CapacitySnapshot,
    ) -> Option<TriggerFinding> {
        let persistence_ms = (self.config.regime_persistence_secs as i64) * 1_000;
        let confirmed = self
            .regime
            .observe(ctx.regime, ctx.captured_at_ms, persistence_ms);
        if !confirmed || ctx.regime == MarketRegime::Unknown {
            return None;
        }
        let spawn = 2u32.min(capacity.free_slots());
        if spawn == 0 {
            return None;
        }
        tracing::info!(regime = ctx.regime.as_str(), "regime change confirmed");
        Some(TriggerFinding::RegimeChange { spawn_r1: spawn })
    }

    /// Spawn proportionally to upcoming calendar events, capped.
    fn event_trigger(
        &self,
        ctx: &MarketContext,
        capacity: &CapacitySnapshot,
    ) -> Option<TriggerFinding> {
        let horizon_ms = (self.config.event_lookahead_hours as i64) * 3_600_000;
        let upcoming = ctx
            .calendar
            .iter()
            .filter(|e| {
                e.scheduled_at_ms > ctx.captured_at_ms
                    && e.scheduled_at_ms - ctx.captured_at_ms <= horizon_ms
            })
            .count() as u32;
        if upcoming == 0 {
            return None;
        }
        let spawn = upcoming
            .min(self.config.event_spawn_cap)
            .min(capacity.free_slots());
        if spawn == 0 {
            return None;
        }
        Some(TriggerFinding::EventDriven { spawn_r1: spawn })
    }

    /// Reseed when too much of the live cohort underperforms the alpha floor.
    fn drift_trigger(&self, roster: &[StrategyRecord]) -> Option<TriggerFinding> {
        let live: Vec<_> = roster.iter().filter(|s| s.is_live()).collect();
        if live.is_empty() {
            return None;
        }
        let under = live
            .iter()
            .filter(|s| s.performance.total_return_pct < self.config.drift_alpha_threshold_pct)
            .count();
        let under_pct = (under as f64 / live.len() as f64) * 100.0;
        if under_pct > self.config.drift_underperform_pct {
            Some(TriggerFinding::Drift)
        } else {
            None
        }
    }

    /// Keep the exploration cohort at its quota, capped per cycle.
    fn novelty_trigger(
        &self,
        roster: &[StrategyRecord],
        capacity: &CapacitySnapshot,
    ) -> Option<TriggerFinding> {
        let active: Vec<_> = roster.iter().filter(|s| s.is_active()).collect();
        if active.is_empty() {
            return None;
        }
        let target =
            ((active.len() as f64) * self.config.exploration_quota_pct / 100.0).ceil() as usize;
        let tagged = active.iter().filter(|s| s.exploration).count();
        if tagged >= target {
            return None;
        }
        let shortfall = (target - tagged) as u32;
        let spawn = shortfall
            .min(self.config.exploration_spawn_cap)
            .min(capacity.free_slots());
        if spawn == 0 {
            return None;
        }
        Some(TriggerFinding::Novelty {
            spawn_exploration: spawn,
        })
    }

    /// Scan paper strategies whose criteria already hold and queue the next
    /// round for each: R1 -> R2, R2 -> R3, R3 -> live.
    fn advancement_scan(&self, roster: &[StrategyRecord], needs: &mut RosterNeeds) {
        for record in roster {
            if record.archived || record.status != StrategyStatus::Paper {
                continue;
            }
            if !record.promotion_criteria.is_met(&record.performance) {
                continue;
            }
            match stage_for(record.status, record.allocated_capital_usd) {
                TournamentStage::R1 => needs.promote_to_r2.push(record.id.clone()),
                TournamentStage::R2 => needs.promote_to_r3.push(record.id.clone()),
                TournamentStage::R3 => needs.promote_to_live.push(record.id.clone()),
                TournamentStage::Live => {}
            }
        }
    }
}
