use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::model::{CapacitySnapshot, MarketContext, StrategyFamily, TournamentStage};
use crate::trigger::RosterNeeds;

/// One roster action the orchestrator carried out during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ExecutedAction {
    Spawned {
        strategy_id: String,
        family: StrategyFamily,
        exploration: bool,
    },
    Promoted {
        strategy_id: String,
        to: TournamentStage,
    },
    Demoted {
        strategy_id: String,
    },
    Reseeded {
        family: StrategyFamily,
        strategy_id: String,
    },
    Halted {
        breaker: String,
    },
}

/// Audit entry for one decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle: u64,
    pub started_at_ms: i64,
    pub duration_ms: u64,
    pub context: MarketContext,
    pub needs: RosterNeeds,
    pub executed: Vec<ExecutedAction>,
    pub roster_size: usize,
    pub capacity: CapacitySnapshot,
}

/// Bounded recent-history window of cycle records, oldest evicted first.
#[derive(Debug)]
pub struct CycleHistory {
    records: VecDeque<CycleRecord>,
    cap: usize,
}

impl CycleHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(cap.min(128)),
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, record: CycleRecord) {
        if self.records.len() == self.cap {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&CycleRecord> {
        self.records.back()
    }

    /// Most recent `n` records, newest first.
    pub fn recent(&self, n: usize) -> Vec<CycleRecord> {
        self.records.iter().rev().take(n).cloned().collect()
    }
}
