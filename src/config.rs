use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::model::PromotionCriteria;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    pub decision: DecisionConfig,
    pub triggers: TriggerConfig,
    pub breakers: BreakerConfig,
    pub capacity: CapacityConfig,
    pub lifecycle: LifecycleConfig,
    pub persistence: PersistenceConfig,
    pub status: StatusConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Seconds between decision cycles.
    pub cycle_interval_secs: u64,
    /// TTL for the cached market context snapshot.
    pub market_context_ttl_secs: u64,
    /// Bounded FIFO window of retained cycle records.
    pub cycle_history_len: usize,
    /// Upper bound applied to every external provider call.
    pub provider_timeout_ms: u64,
    /// IANA timezone of the traded venue (e.g. "America/New_York").
    pub market_timezone: String,
    /// Venue open, "HH:MM" in the venue timezone.
    pub market_open: String,
    /// Venue close, "HH:MM" in the venue timezone.
    pub market_close: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionConfig {
    pub cache_ttl_ms: u64,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    /// Multiplier applied to the combined score when a position is held.
    pub position_dampening: f64,
    pub exit_winner_threshold: f64,
    pub exit_loser_threshold: f64,
    /// Profit percent above which a winner is eligible for exit.
    pub exit_profit_trigger_pct: f64,
    /// Loss percent above which a loser is eligible for exit.
    pub exit_loss_trigger_pct: f64,
    /// Positions older than this decay their exit score.
    pub stale_position_days: u32,
    pub stale_position_decay: f64,
    /// Reject outright above this capital utilization.
    pub max_capital_utilization_pct: f64,
    /// Reject outright when market data is older than this.
    pub max_data_age_ms: u64,
    pub max_open_positions: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    /// Spawn R1 strategies while paper budget utilization is below this.
    pub budget_spawn_below_pct: f64,
    /// Spawn R1 strategies while roster slot utilization is below this.
    pub slot_spawn_below_pct: f64,
    /// Live strategies with trailing Sharpe below this are flagged for demotion.
    pub decay_sharpe_threshold: f64,
    /// A regime flip must persist this long before the trigger fires.
    pub regime_persistence_secs: u64,
    /// Calendar lookahead window for event-driven spawns.
    pub event_lookahead_hours: u64,
    /// Hard cap on event-driven spawns per cycle.
    pub event_spawn_cap: u32,
    /// Reseed families when this share of live strategies underperforms.
    pub drift_underperform_pct: f64,
    /// Total-return alpha floor used by the drift trigger.
    pub drift_alpha_threshold_pct: f64,
    /// Target share of exploration-tagged strategies in the roster.
    pub exploration_quota_pct: f64,
    /// Hard cap on novelty spawns per cycle.
    pub exploration_spawn_cap: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    /// Volatility index level that trips the vix_spike breaker.
    pub vix_threshold: f64,
    /// Period portfolio return (percent) below which extreme_drawdown trips.
    pub portfolio_return_floor_pct: f64,
    /// Share of the roster that must be failing to trip mass_failure.
    pub mass_failure_pct: f64,
    pub mass_failure_sharpe_below: f64,
    pub mass_failure_drawdown_above_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapacityConfig {
    pub paper_budget_total_usd: f64,
    pub roster_slots_max: u32,
    /// Capital allocated to a freshly spawned R1 strategy.
    pub r1_allocation_usd: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    pub demote_sharpe_below: f64,
    pub demote_drawdown_above_pct: f64,
    pub demote_win_rate_below_pct: f64,
    /// Win-rate demotion only applies at or beyond this sample size.
    pub demote_min_trades: u32,
    #[serde(default)]
    pub promotion: Option<PromotionCriteria>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    pub roster_path: String,
    pub transitions_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Parse a "HH:MM" venue time into (hour, minute).
pub fn parse_clock(s: &str) -> Result<(u32, u32)> {
    let Some((h, m)) = s.split_once(':') else {
        bail!("invalid clock '{}': expected HH:MM", s);
    };
    let hour: u32 = h
        .parse()
        .with_context(|| format!("invalid clock '{}': bad hour", s))?;
    let minute: u32 = m
        .parse()
        .with_context(|| format!("invalid clock '{}': bad minute", s))?;
    if hour > 23 || minute > 59 {
        bail!("invalid clock '{}': out of range", s);
    }
    Ok((hour, minute))
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = Path::new("config/default.toml");
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let config: Config =
            toml::from_str(&config_str).context("failed to parse config/default.toml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.decision.buy_threshold <= self.decision.sell_threshold {
            bail!(
                "decision.buy_threshold ({}) must be above decision.sell_threshold ({})",
                self.decision.buy_threshold,
                self.decision.sell_threshold
            );
        }
        if self.orchestrator.cycle_interval_secs == 0 {
            bail!("orchestrator.cycle_interval_secs must be > 0");
        }
        if self.capacity.roster_slots_max == 0 {
            bail!("capacity.roster_slots_max must be > 0");
        }
        self.orchestrator
            .market_timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| {
                anyhow::anyhow!(
                    "orchestrator.market_timezone '{}' is not a known IANA zone",
                    self.orchestrator.market_timezone
                )
            })?;
        parse_clock(&self.orchestrator.market_open).context("orchestrator.market_open")?;
        parse_clock(&self.orchestrator.market_close).context("orchestrator.market_close")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
[orchestrator]
cycle_interval_secs = 900
market_context_ttl_secs = 300
cycle_history_len = 100
provider_timeout_ms = 2000
market_timezone = "America/New_York"
market_open = "09:30"
market_close = "16:00"

[decision]
cache_ttl_ms = 3000
buy_threshold = 0.40
sell_threshold = 0.38
position_dampening = 0.9
exit_winner_threshold = 0.45
exit_loser_threshold = 0.50
exit_profit_trigger_pct = 2.0
exit_loss_trigger_pct = 1.0
stale_position_days = 5
stale_position_decay = 0.8
max_capital_utilization_pct = 95.0
max_data_age_ms = 60000
max_open_positions = 20

[triggers]
budget_spawn_below_pct = 75.0
slot_spawn_below_pct = 80.0
decay_sharpe_threshold = -0.3
regime_persistence_secs = 300
event_lookahead_hours = 48
event_spawn_cap = 3
drift_underperform_pct = 40.0
drift_alpha_threshold_pct = 0.0
exploration_quota_pct = 10.0
exploration_spawn_cap = 5

[breakers]
vix_threshold = 35.0
portfolio_return_floor_pct = -5.0
mass_failure_pct = 50.0
mass_failure_sharpe_below = 0.5
mass_failure_drawdown_above_pct = 10.0

[capacity]
paper_budget_total_usd = 100000.0
roster_slots_max = 40
r1_allocation_usd = 1000.0

[lifecycle]
demote_sharpe_below = 0.5
demote_drawdown_above_pct = 15.0
demote_win_rate_below_pct = 45.0
demote_min_trades = 100

[persistence]
roster_path = "data/roster.json"
transitions_path = "data/transitions.jsonl"

[status]
listen_addr = "127.0.0.1:8787"

[logging]
level = "info"
"#
    }

    #[test]
    fn parse_default_toml() {
        let config: Config = toml::from_str(sample_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.orchestrator.cycle_interval_secs, 900);
        assert!((config.decision.buy_threshold - 0.40).abs() < f64::EPSILON);
        assert!((config.decision.sell_threshold - 0.38).abs() < f64::EPSILON);
        assert_eq!(config.triggers.exploration_spawn_cap, 5);
        assert_eq!(config.capacity.roster_slots_max, 40);
        assert!(config.lifecycle.promotion.is_none());
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let mut config: Config = toml::from_str(sample_toml()).unwrap();
        config.decision.buy_threshold = 0.30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_timezone_rejected() {
        let mut config: Config = toml::from_str(sample_toml()).unwrap();
        config.orchestrator.market_timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_clock_valid_and_invalid() {
        assert_eq!(parse_clock("09:30").unwrap(), (9, 30));
        assert_eq!(parse_clock("16:00").unwrap(), (16, 0));
        assert!(parse_clock("24:00").is_err());
        assert!(parse_clock("0930").is_err());
        assert!(parse_clock("ab:cd").is_err());
    }
}
