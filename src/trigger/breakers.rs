use serde::{Deserialize, Serialize};

use crate::config::BreakerConfig;
use crate::model::{MarketContext, StrategyRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerKind {
    VixSpike,
    ExtremeDrawdown,
    MassFailure,
}

impl BreakerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VixSpike => "vix_spike",
            Self::ExtremeDrawdown => "extreme_drawdown",
            Self::MassFailure => "mass_failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerSeverity {
    High,
    Critical,
}

impl BreakerSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// One tripped emergency condition. Any breaker halts spawn/promote/demote
/// activity for the cycle; monitoring of existing exposure continues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreaker {
    pub kind: BreakerKind,
    pub severity: BreakerSeverity,
    pub message: String,
    pub suggested_action: String,
}

pub struct BreakerEngine {
    config: BreakerConfig,
}

impl BreakerEngine {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config }
    }

    /// Evaluate every breaker against the cycle context. Checked first each
    /// cycle, independent of the normal triggers.
    pub fn check(&self, ctx: &MarketContext, roster: &[StrategyRecord]) -> Vec<CircuitBreaker> {
        let mut tripped = Vec::new();

        if ctx.vix > self.config.vix_threshold {
            tripped.push(CircuitBreaker {
                kind: BreakerKind::VixSpike,
                severity: BreakerSeverity::High,
                message: format!(
                    "volatility index {:.1} above {:.1}",
                    ctx.vix, self.config.vix_threshold
                ),
                suggested_action: "halt new exposure until volatility normalizes".to_string(),
            });
        }

        if ctx.portfolio_return_pct < self.config.portfolio_return_floor_pct {
            tripped.push(CircuitBreaker {
                kind: BreakerKind::ExtremeDrawdown,
                severity: BreakerSeverity::Critical,
                message: format!(
                    "portfolio return {:.2}% below {:.2}% floor",
                    ctx.portfolio_return_pct, self.config.portfolio_return_floor_pct
                ),
                suggested_action: "halt spawning and review live allocations".to_string(),
            });
        }

        if let Some(breaker) = self.mass_failure(roster) {
            tripped.push(breaker);
        }

        for breaker in &tripped {
            tracing::warn!(
                breaker = breaker.kind.as_str(),
                severity = breaker.severity.as_str(),
                message = %breaker.message,
                "circuit breaker tripped"
            );
        }
        tripped
    }

    fn mass_failure(&self, roster: &[StrategyRecord]) -> Option<CircuitBreaker> {
        // Strategies with no fills yet carry a zeroed Sharpe and would trip
        // the breaker on a freshly seeded roster; only scored cohorts count.
        let active: Vec<_> = roster
            .iter()
            .filter(|s| s.is_active() && s.performance.trade_count > 0)
            .collect();
        if active.is_empty() {
            return None;
        }
        let failing = active
            .iter()
            .filter(|s| {
                s.performance.sharpe < self.config.mass_failure_sharpe_below
                    || s.performance.max_drawdown_pct > self.config.mass_failure_drawdown_above_pct
            })
            .count();
        let failing_pct = (failing as f64 / active.len() as f64) * 100.0;
        if failing_pct <= self.config.mass_failure_pct {
            return None;
        }
        Some(CircuitBreaker {
            kind: BreakerKind::MassFailure,
            severity: BreakerSeverity::Critical,
            message: format!(
                "{failing} of {} strategies failing ({failing_pct:.0}%)",
                active.len()
            ),
            suggested_action: "halt all transitions and reseed after review".to_string(),
        })
    }
}
