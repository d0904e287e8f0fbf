use tokio::sync::broadcast;

use crate::decision::Decision;
use crate::trigger::CircuitBreaker;

/// Events published for external consumers (analytics, audit). Dropped
/// silently when nobody is subscribed.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    DecisionMade(Decision),
    BreakerTripped(CircuitBreaker),
    CycleCompleted {
        cycle: u64,
        duration_ms: u64,
        spawned: u32,
        promoted: u32,
        demoted: u32,
    },
}

pub type EventSender = broadcast::Sender<CoreEvent>;

pub fn channel(capacity: usize) -> (EventSender, broadcast::Receiver<CoreEvent>) {
    broadcast::channel(capacity)
}
