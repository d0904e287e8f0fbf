use quant_arena::audit::{CycleHistory, CycleRecord};
use quant_arena::model::{CapacitySnapshot, MarketContext};
use quant_arena::trigger::RosterNeeds;

fn record(cycle: u64) -> CycleRecord {
    CycleRecord {
        cycle,
        started_at_ms: 1_700_000_000_000 + cycle as i64 * 900_000,
        duration_ms: 12,
        context: MarketContext::unknown(1_700_000_000_000),
        needs: RosterNeeds::default(),
        executed: Vec::new(),
        roster_size: 0,
        capacity: CapacitySnapshot {
            paper_budget_used_usd: 0.0,
            paper_budget_total_usd: 100_000.0,
            roster_slots_used: 0,
            roster_slots_max: 40,
        },
    }
}

#[test]
/// Verifies the bounded window: pushing past the cap evicts the oldest
/// record first.
fn history_evicts_oldest_at_capacity() {
    let mut history = CycleHistory::new(3);
    for cycle in 1..=5 {
        history.push(record(cycle));
    }

    assert_eq!(history.len(), 3);
    let recent = history.recent(10);
    let cycles: Vec<u64> = recent.iter().map(|r| r.cycle).collect();
    assert_eq!(cycles, vec![5, 4, 3]);
}

#[test]
/// Verifies ordering helpers: latest returns the newest record and recent
/// lists newest first with a smaller limit honored.
fn latest_and_recent_order_newest_first() {
    let mut history = CycleHistory::new(10);
    assert!(history.is_empty());
    assert!(history.latest().is_none());

    for cycle in 1..=4 {
        history.push(record(cycle));
    }
    assert_eq!(history.latest().expect("latest missing").cycle, 4);

    let recent = history.recent(2);
    let cycles: Vec<u64> = recent.iter().map(|r| r.cycle).collect();
    assert_eq!(cycles, vec![4, 3]);
}

#[test]
/// Verifies a zero cap is clamped to one instead of panicking.
fn zero_capacity_keeps_one_record() {
    let mut history = CycleHistory::new(0);
    history.push(record(1));
    history.push(record(2));
    assert_eq!(history.len(), 1);
    assert_eq!(history.latest().expect("latest missing").cycle, 2);
}
