pub mod breakers;
pub mod engine;
pub mod family;

use serde::{Deserialize, Serialize};

pub use breakers::{BreakerEngine, BreakerKind, BreakerSeverity, CircuitBreaker};
pub use engine::{RegimeTracker, TriggerEngine, TriggerFinding};
pub use family::FamilyPlanner;

/// Merged per-cycle result of the independent trigger evaluations.
///
/// Scalar spawn counts merge by maximum, booleans by OR, demotion and
/// promotion id sets by union. Transient: lives only for the cycle and in
/// its audit record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterNeeds {
    /// New R1 paper strategies to spawn this cycle.
    pub spawn_r1: u32,
    /// Additional exploration-tagged spawns from the novelty trigger.
    pub spawn_exploration: u32,
    /// Paper strategies ready to advance R1 -> R2.
    pub promote_to_r2: Vec<String>,
    /// Paper strategies ready to advance R2 -> R3.
    pub promote_to_r3: Vec<String>,
    /// Paper strategies that cleared every criterion for live capital.
    pub promote_to_live: Vec<String>,
    /// Live strategies flagged for demotion.
    pub demote: Vec<String>,
    /// Reseed strategy families with fresh phenotypes.
    pub reseed_families: bool,
    /// Names of the triggers that fired.
    pub triggers_fired: Vec<String>,
}

impl RosterNeeds {
    /// Emergency needs while a circuit breaker is open: every count zeroed,
    /// only the breaker marker in the fired list.
    pub fn halted() -> Self {
        Self {
            triggers_fired: vec!["circuit_breaker".to_string()],
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spawn_r1 == 0
            && self.spawn_exploration == 0
            && self.promote_to_r2.is_empty()
            && self.promote_to_r3.is_empty()
            && self.promote_to_live.is_empty()
            && self.demote.is_empty()
            && !self.reseed_families
    }
}
