use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::watch;

use crate::audit::{CycleHistory, CycleRecord, ExecutedAction};
use crate::config::Config;
use crate::decision::{SharedHealth, SystemHealth};
use crate::events::{CoreEvent, EventSender};
use crate::hours::MarketHours;
use crate::lifecycle::StrategyLifecycleManager;
use crate::market::{account_or_default, CachedMarketContext, MarketContextProvider, PositionsProvider};
use crate::model::{CapacitySnapshot, MarketContext, StrategyRecord, StrategyStatus, TournamentStage, TransitionReason};
use crate::phenotype::PhenotypeGenerator;
use crate::trigger::{BreakerEngine, CircuitBreaker, FamilyPlanner, RosterNeeds, TriggerEngine};

/// Introspection snapshot for external dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub running: bool,
    pub cycle_count: u64,
    pub last_run_ms: Option<i64>,
    pub last_error: Option<String>,
    pub active_breakers: Vec<CircuitBreaker>,
    pub recent_cycles: Vec<CycleRecord>,
}

/// Top-level periodic control loop.
///
/// Holds typed references to the trigger engine, lifecycle manager, and
/// phenotype generator, constructed once at startup. Cycles are single
/// flight: a tick that lands while the previous cycle is still executing is
/// skipped, and `stop` cancels future ticks without aborting in-flight work.
pub struct Orchestrator {
    config: Config,
    hours: MarketHours,
    market: CachedMarketContext,
    positions: Arc<dyn PositionsProvider>,
    breakers: BreakerEngine,
    triggers: tokio::sync::Mutex<TriggerEngine>,
    lifecycle: Arc<StrategyLifecycleManager>,
    phenotypes: tokio::sync::Mutex<Box<dyn PhenotypeGenerator>>,
    planner: FamilyPlanner,
    rng: Mutex<StdRng>,
    health: Arc<SharedHealth>,
    events: EventSender,
    history: Mutex<CycleHistory>,
    cycle_count: AtomicU64,
    last_run_ms: AtomicI64,
    last_error: Mutex<Option<String>>,
    active_breakers: Mutex<Vec<CircuitBreaker>>,
    cycle_guard: tokio::sync::Mutex<()>,
    running: AtomicBool,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        market_provider: Arc<dyn MarketContextProvider>,
        positions: Arc<dyn PositionsProvider>,
        lifecycle: Arc<StrategyLifecycleManager>,
        phenotypes: Box<dyn PhenotypeGenerator>,
        health: Arc<SharedHealth>,
        events: EventSender,
    ) -> Result<Self> {
        let hours = MarketHours::from_config(&config.orchestrator)?;
        let call_timeout = Duration::from_millis(config.orchestrator.provider_timeout_ms);
        let market = CachedMarketContext::new(
            market_provider,
            Duration::from_secs(config.orchestrator.market_context_ttl_secs),
            call_timeout,
        );
        let history = CycleHistory::new(config.orchestrator.cycle_history_len);
        Ok(Self {
            breakers: BreakerEngine::new(config.breakers.clone()),
            triggers: tokio::sync::Mutex::new(TriggerEngine::new(config.triggers.clone())),
            hours,
            market,
            positions,
            lifecycle,
            phenotypes: tokio::sync::Mutex::new(phenotypes),
            planner: FamilyPlanner,
            rng: Mutex::new(StdRng::from_entropy()),
            health,
            events,
            history: Mutex::new(history),
            cycle_count: AtomicU64::new(0),
            last_run_ms: AtomicI64::new(0),
            last_error: Mutex::new(None),
            active_breakers: Mutex::new(Vec::new()),
            cycle_guard: tokio::sync::Mutex::new(()),
            running: AtomicBool::new(false),
            shutdown_tx: Mutex::new(None),
            config,
        })
    }

    /// Run one immediate cycle, then schedule recurring cycles gated by
    /// market hours. Idempotent while already running.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("orchestrator already running");
            return;
        }
        let (tx, mut rx) = watch::channel(false);
        if let Ok(mut guard) = self.shutdown_tx.lock() {
            *guard = Some(tx);
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = this.config.orchestrator.cycle_interval_secs,
                "orchestrator started"
            );
            if this.hours.is_open_now() {
                if let Err(e) = this.run_cycle().await {
                    tracing::warn!(error = %e, "initial cycle failed");
                }
            } else {
                tracing::info!("market closed, initial cycle skipped");
            }

            let mut ticker = tokio::time::interval(Duration::from_secs(
                this.config.orchestrator.cycle_interval_secs,
            ));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first interval tick fires immediately; the immediate cycle
            // above already covered it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !this.hours.is_open_now() {
                            tracing::debug!("market closed, cycle skipped");
                            continue;
                        }
                        if let Err(e) = this.run_cycle().await {
                            tracing::warn!(error = %e, "cycle failed");
                        }
                    }
                    _ = rx.changed() => break,
                }
            }
            this.running.store(false, Ordering::SeqCst);
            tracing::info!("orchestrator stopped");
        });
    }

    /// Cancel future ticks. An in-flight cycle runs to completion so no
    /// state-machine transition is cut in half.
    pub fn stop(&self) {
        let tx = self.shutdown_tx.lock().ok().and_then(|mut g| g.take());
        if let Some(tx) = tx {
            let _ = tx.send(true);
        }
    }

    pub fn status(&self) -> OrchestratorStatus {
        let last_run = self.last_run_ms.load(Ordering::SeqCst);
        OrchestratorStatus {
            running: self.running.load(Ordering::SeqCst),
            cycle_count: self.cycle_count.load(Ordering::SeqCst),
            last_run_ms: (last_run > 0).then_some(last_run),
            last_error: self.last_error.lock().ok().and_then(|g| g.clone()),
            active_breakers: self
                .active_breakers
                .lock()
                .map(|g| g.clone())
                .unwrap_or_default(),
            recent_cycles: self
                .history
                .lock()
                .map(|g| g.recent(10))
                .unwrap_or_default(),
        }
    }

    /// Manual trigger: force one cycle outside the schedule. Fails when a
    /// cycle is already in flight rather than running concurrently.
    pub async fn run_cycle_now(&self) -> Result<CycleRecord> {
        self.run_cycle().await
    }

    async fn run_cycle(&self) -> Result<CycleRecord> {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            bail!("cycle already in progress");
        };
        let started = Instant::now();
        let started_at_ms = chrono::Utc::now().timestamp_millis();
        let cycle = self.cycle_count.load(Ordering::SeqCst) + 1;

        let result = self.run_cycle_inner(cycle, started_at_ms, started).await;
        match &result {
            Ok(record) => {
                self.cycle_count.store(cycle, Ordering::SeqCst);
                self.last_run_ms.store(started_at_ms, Ordering::SeqCst);
                if let Ok(mut guard) = self.last_error.lock() {
                    *guard = None;
                }
                if let Ok(mut guard) = self.history.lock() {
                    guard.push(record.clone());
                }
            }
            Err(e) => {
                if let Ok(mut guard) = self.last_error.lock() {
                    *guard = Some(format!("{e:#}"));
                }
            }
        }
        result
    }

    async fn run_cycle_inner(
        &self,
        cycle: u64,
        started_at_ms: i64,
        started: Instant,
    ) -> Result<CycleRecord> {
        let call_timeout = Duration::from_millis(self.config.orchestrator.provider_timeout_ms);
        let ctx = self.market.fetch().await;
        let account = account_or_default(&*self.positions, call_timeout).await;
        let roster = self.lifecycle.roster().context("failed to load roster")?;
        let capacity = self.capacity_snapshot(&roster);

        let tripped = self.breakers.check(&ctx, &roster);
        self.health.set(SystemHealth {
            breaker_open: !tripped.is_empty(),
            capital_utilization_pct: account.capital_utilization_pct,
            market_data_age_ms: ctx.data_age_ms,
            open_positions: account.positions.len(),
        });
        if let Ok(mut guard) = self.active_breakers.lock() {
            *guard = tripped.clone();
        }

        if !tripped.is_empty() {
            for breaker in &tripped {
                let _ = self.events.send(CoreEvent::BreakerTripped(breaker.clone()));
            }
            let executed = tripped
                .iter()
                .map(|b| ExecutedAction::Halted {
                    breaker: b.kind.as_str().to_string(),
                })
                .collect();
            let record = CycleRecord {
                cycle,
                started_at_ms,
                duration_ms: started.elapsed().as_millis() as u64,
                context: ctx,
                needs: RosterNeeds::halted(),
                executed,
                roster_size: roster.len(),
                capacity,
            };
            tracing::warn!(cycle, breakers = tripped.len(), "cycle halted by breakers");
            return Ok(record);
        }

        let needs = self
            .triggers
            .lock()
            .await
            .evaluate(&ctx, &roster, &capacity);
        let executed = self.execute_needs(&ctx, &roster, &capacity, &needs).await;

        let (mut spawned, mut promoted, mut demoted) = (0u32, 0u32, 0u32);
        for action in &executed {
            match action {
                ExecutedAction::Spawned { .. } | ExecutedAction::Reseeded { .. } => spawned += 1,
                ExecutedAction::Promoted { .. } => promoted += 1,
                ExecutedAction::Demoted { .. } => demoted += 1,
                ExecutedAction::Halted { .. } => {}
            }
        }
        let duration_ms = started.elapsed().as_millis() as u64;
        let _ = self.events.send(CoreEvent::CycleCompleted {
            cycle,
            duration_ms,
            spawned,
            promoted,
            demoted,
        });
        tracing::info!(cycle, duration_ms, spawned, promoted, demoted, "cycle complete");

        Ok(CycleRecord {
            cycle,
            started_at_ms,
            duration_ms,
            context: ctx,
            needs,
            executed,
            roster_size: roster.len(),
            capacity,
        })
    }

    /// Dispatch the merged needs. Individual action failures are logged and
    /// skipped so one bad strategy cannot wedge the whole cycle.
    async fn execute_needs(
        &self,
        ctx: &MarketContext,
        roster: &[StrategyRecord],
        capacity: &CapacitySnapshot,
        needs: &RosterNeeds,
    ) -> Vec<ExecutedAction> {
        let mut executed = Vec::new();
        let mut free_slots = capacity.free_slots();

        for exploration in [false, true] {
            let want = if exploration {
                needs.spawn_exploration
            } else {
                needs.spawn_r1
            };
            for _ in 0..want.min(free_slots) {
                match self.spawn_one(ctx, roster, exploration).await {
                    Ok(record) => {
                        free_slots = free_slots.saturating_sub(1);
                        executed.push(ExecutedAction::Spawned {
                            strategy_id: record.id,
                            family: record.family,
                            exploration,
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "spawn failed"),
                }
            }
        }

        for (ids, to) in [
            (&needs.promote_to_r2, TournamentStage::R2),
            (&needs.promote_to_r3, TournamentStage::R3),
        ] {
            for id in ids.iter() {
                match self.lifecycle.advance_round(id).await {
                    Ok(_) => executed.push(ExecutedAction::Promoted {
                        strategy_id: id.clone(),
                        to,
                    }),
                    Err(e) => tracing::warn!(strategy = %id, error = %e, "round advance failed"),
                }
            }
        }

        for id in &needs.promote_to_live {
            match self.lifecycle.promote(id, TransitionReason::Automatic).await {
                Ok(_) => executed.push(ExecutedAction::Promoted {
                    strategy_id: id.clone(),
                    to: TournamentStage::Live,
                }),
                Err(e) => tracing::warn!(strategy = %id, error = %e, "promotion failed"),
            }
        }

        for id in &needs.demote {
            match self.lifecycle.demote(id, TransitionReason::Automatic).await {
                Ok(_) => executed.push(ExecutedAction::Demoted {
                    strategy_id: id.clone(),
                }),
                Err(e) => tracing::warn!(strategy = %id, error = %e, "demotion failed"),
            }
        }

        if needs.reseed_families {
            for family in crate::model::StrategyFamily::all() {
                if free_slots == 0 {
                    break;
                }
                let params = self.phenotypes.lock().await.generate(family, ctx.regime);
                let label = self.spawn_label(family);
                match self
                    .lifecycle
                    .register(label, family, params, false, None)
                {
                    Ok(record) => {
                        free_slots -= 1;
                        executed.push(ExecutedAction::Reseeded {
                            family,
                            strategy_id: record.id,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(family = family.as_str(), error = %e, "reseed failed")
                    }
                }
            }
        }

        executed
    }

    async fn spawn_one(
        &self,
        ctx: &MarketContext,
        roster: &[StrategyRecord],
        exploration: bool,
    ) -> Result<StrategyRecord> {
        let family = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| anyhow::anyhow!("rng lock poisoned"))?;
            self.planner.select(roster, ctx.regime, &mut *rng)
        };
        let params = self.phenotypes.lock().await.generate(family, ctx.regime);
        let label = self.spawn_label(family);
        self.lifecycle
            .register(label, family, params, exploration, None)
    }

    fn spawn_label(&self, family: crate::model::StrategyFamily) -> String {
        let suffix: u16 = self
            .rng
            .lock()
            .map(|mut rng| rng.gen_range(1000..10000))
            .unwrap_or(1000);
        format!("{}-{}", family.as_str(), suffix)
    }

    fn capacity_snapshot(&self, roster: &[StrategyRecord]) -> CapacitySnapshot {
        let active: Vec<_> = roster.iter().filter(|s| s.is_active()).collect();
        let paper_budget_used_usd = active
            .iter()
            .filter(|s| s.status == StrategyStatus::Paper)
            .map(|s| s.allocated_capital_usd)
            .sum();
        CapacitySnapshot {
            paper_budget_used_usd,
            paper_budget_total_usd: self.config.capacity.paper_budget_total_usd,
            roster_slots_used: active.len() as u32,
            roster_slots_max: self.config.capacity.roster_slots_max,
        }
    }
}
