use std::collections::BTreeMap;

use quant_arena::config::BreakerConfig;
use quant_arena::model::{
    MarketContext, MarketRegime, PerformanceSnapshot, StrategyFamily, StrategyRecord,
    StrategyStatus,
};
use quant_arena::trigger::{BreakerEngine, BreakerKind, BreakerSeverity};

fn breaker_config() -> BreakerConfig {
    BreakerConfig {
        vix_threshold: 35.0,
        portfolio_return_floor_pct: -5.0,
        mass_failure_pct: 50.0,
        mass_failure_sharpe_below: 0.5,
        mass_failure_drawdown_above_pct: 10.0,
    }
}

fn context(vix: f64, portfolio_return_pct: f64) -> MarketContext {
    MarketContext {
        regime: MarketRegime::Trending,
        vix,
        trend_strength: 0.6,
        portfolio_return_pct,
        data_age_ms: 1000,
        calendar: Vec::new(),
        captured_at_ms: chrono::Utc::now().timestamp_millis(),
    }
}

fn live_strategy(sharpe: f64, max_drawdown_pct: f64, trade_count: u32) -> StrategyRecord {
    let mut record = StrategyRecord::new_paper(
        "trend_following-1234",
        StrategyFamily::TrendFollowing,
        BTreeMap::new(),
        1000.0,
    );
    record.status = StrategyStatus::Live;
    record.performance = PerformanceSnapshot {
        trade_count,
        win_rate_pct: 55.0,
        sharpe,
        max_drawdown_pct,
        total_return_pct: 3.0,
        breach_count: 0,
    };
    record
}

#[test]
/// Verifies the volatility breaker: a volatility index of 40 trips vix_spike
/// at high severity.
fn vix_spike_trips_at_high_severity() {
    let engine = BreakerEngine::new(breaker_config());
    let tripped = engine.check(&context(40.0, 1.0), &[]);

    assert_eq!(tripped.len(), 1);
    assert_eq!(tripped[0].kind, BreakerKind::VixSpike);
    assert_eq!(tripped[0].severity, BreakerSeverity::High);
    assert_eq!(tripped[0].kind.as_str(), "vix_spike");
    assert_eq!(tripped[0].severity.as_str(), "high");
}

#[test]
/// Verifies the drawdown breaker: a portfolio return under the -5% floor
/// trips extreme_drawdown at critical severity.
fn extreme_drawdown_trips_at_critical_severity() {
    let engine = BreakerEngine::new(breaker_config());
    let tripped = engine.check(&context(18.0, -6.5), &[]);

    assert_eq!(tripped.len(), 1);
    assert_eq!(tripped[0].kind, BreakerKind::ExtremeDrawdown);
    assert_eq!(tripped[0].severity, BreakerSeverity::Critical);
}

#[test]
/// Verifies mass failure: with more than half the scored roster failing on
/// Sharpe or drawdown, the critical breaker trips.
fn mass_failure_trips_when_majority_of_roster_fails() {
    let engine = BreakerEngine::new(breaker_config());
    let roster = vec![
        live_strategy(0.2, 4.0, 30),
        live_strategy(0.1, 12.0, 25),
        live_strategy(-0.4, 6.0, 40),
        live_strategy(1.4, 3.0, 50),
    ];
    let tripped = engine.check(&context(18.0, 1.0), &roster);

    assert_eq!(tripped.len(), 1);
    assert_eq!(tripped[0].kind, BreakerKind::MassFailure);
    assert_eq!(tripped[0].severity, BreakerSeverity::Critical);
}

#[test]
/// Verifies the unscored-cohort exclusion: a freshly seeded roster with zero
/// trades carries zeroed Sharpe values and must not trip mass failure.
fn fresh_roster_without_fills_does_not_trip_mass_failure() {
    let engine = BreakerEngine::new(breaker_config());
    let roster = vec![
        live_strategy(0.0, 0.0, 0),
        live_strategy(0.0, 0.0, 0),
        live_strategy(0.0, 0.0, 0),
    ];
    assert!(engine.check(&context(18.0, 1.0), &roster).is_empty());
}

#[test]
/// Verifies independence: vix and drawdown breakers can trip in the same
/// cycle and both are reported.
fn multiple_breakers_report_together() {
    let engine = BreakerEngine::new(breaker_config());
    let tripped = engine.check(&context(42.0, -8.0), &[]);

    assert_eq!(tripped.len(), 2);
    let kinds: Vec<_> = tripped.iter().map(|b| b.kind).collect();
    assert!(kinds.contains(&BreakerKind::VixSpike));
    assert!(kinds.contains(&BreakerKind::ExtremeDrawdown));
}

#[test]
/// Verifies the calm path: ordinary conditions trip nothing.
fn calm_conditions_trip_nothing() {
    let engine = BreakerEngine::new(breaker_config());
    let roster = vec![live_strategy(1.4, 3.0, 50)];
    assert!(engine.check(&context(18.0, 1.0), &roster).is_empty());
}
