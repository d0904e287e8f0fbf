use std::time::Duration;

use quant_arena::decision::{Decision, DecisionAction, DecisionCache, DecisionKey, RequestedAction};

fn key(symbol: &str, has_position: bool) -> DecisionKey {
    DecisionKey {
        symbol: symbol.to_string(),
        requested: RequestedAction::Buy,
        strategy_id: "strat-cache001".to_string(),
        has_position,
    }
}

fn decision(symbol: &str, score: f64) -> Decision {
    Decision {
        symbol: symbol.to_string(),
        strategy_id: "strat-cache001".to_string(),
        requested: RequestedAction::Buy,
        action: DecisionAction::Buy,
        score,
        sub_scores: Vec::new(),
        reasons: vec!["test".to_string()],
        created_at_ms: chrono::Utc::now().timestamp_millis(),
    }
}

#[test]
/// Verifies the cache hit path: an entry younger than the TTL is returned
/// unchanged.
fn entry_within_ttl_is_returned_verbatim() {
    let cache = DecisionCache::new(Duration::from_secs(3));
    let stored = decision("AAPL", 0.55);
    cache.put(key("AAPL", false), stored.clone());

    let hit = cache.get(&key("AAPL", false)).expect("expected cache hit");
    assert_eq!(hit, stored);
    assert_eq!(cache.len(), 1);
}

#[test]
/// Verifies expiry: past the TTL the entry is no longer served.
fn entry_past_ttl_is_a_miss() {
    let cache = DecisionCache::new(Duration::from_millis(20));
    cache.put(key("AAPL", false), decision("AAPL", 0.55));

    std::thread::sleep(Duration::from_millis(40));
    assert!(cache.get(&key("AAPL", false)).is_none());
}

#[test]
/// Verifies key granularity: position state is part of the key, so held and
/// unheld evaluations of the same symbol cache independently.
fn position_state_separates_cache_entries() {
    let cache = DecisionCache::new(Duration::from_secs(3));
    cache.put(key("TSLA", false), decision("TSLA", 0.50));
    cache.put(key("TSLA", true), decision("TSLA", 0.45));

    assert_eq!(cache.len(), 2);
    let unheld = cache.get(&key("TSLA", false)).expect("unheld entry missing");
    let held = cache.get(&key("TSLA", true)).expect("held entry missing");
    assert!((unheld.score - 0.50).abs() < f64::EPSILON);
    assert!((held.score - 0.45).abs() < f64::EPSILON);
}

#[test]
/// Verifies the opportunistic sweep: inserting after the TTL elapsed drops
/// expired entries instead of letting the map grow.
fn put_sweeps_expired_entries() {
    let cache = DecisionCache::new(Duration::from_millis(20));
    cache.put(key("AAPL", false), decision("AAPL", 0.55));
    cache.put(key("MSFT", false), decision("MSFT", 0.60));
    assert_eq!(cache.len(), 2);

    std::thread::sleep(Duration::from_millis(40));
    cache.put(key("NVDA", false), decision("NVDA", 0.65));
    assert_eq!(cache.len(), 1);
}

#[test]
/// Verifies the explicit purge used by callers that do not write.
fn purge_expired_clears_stale_entries() {
    let cache = DecisionCache::new(Duration::from_millis(20));
    cache.put(key("AAPL", false), decision("AAPL", 0.55));

    std::thread::sleep(Duration::from_millis(40));
    cache.purge_expired();
    assert!(cache.is_empty());
}
