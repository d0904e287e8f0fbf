pub mod cache;
pub mod engine;
pub mod score;

use serde::{Deserialize, Serialize};

pub use cache::DecisionCache;
pub use engine::{DecisionEngine, HealthProbe, SharedHealth, SystemHealth};
pub use score::{combine_scores, ScoreSource, ScoreSourceKind, SourceScore, NEUTRAL_SCORE};

/// Action requested by the caller for one trade candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestedAction {
    Buy,
    Sell,
    Exit,
}

impl RequestedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Exit => "exit",
        }
    }
}

/// Final verdict for one candidate. Only `Buy` and `Sell` are actionable;
/// `Reject` is a valid decline, `Error` an internal fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Buy,
    Sell,
    Hold,
    Reject,
    Error,
}

impl DecisionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Hold => "hold",
            Self::Reject => "reject",
            Self::Error => "error",
        }
    }

    pub fn is_actionable(self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }
}

/// Stable taxonomy for decision rejections emitted by the health gate.
#[derive(Debug, Clone, Copy)]
pub enum DecisionRejectCode {
    BreakerOpen,
    CapitalExhausted,
    MarketDataStale,
    MaxPositionsReached,
}

impl DecisionRejectCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BreakerOpen => "health.breaker_open",
            Self::CapitalExhausted => "health.capital_exhausted",
            Self::MarketDataStale => "health.market_data_stale",
            Self::MaxPositionsReached => "risk.max_positions_reached",
        }
    }
}

/// Cache key: one entry per (symbol, requested action, strategy, position state).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionKey {
    pub symbol: String,
    pub requested: RequestedAction,
    pub strategy_id: String,
    pub has_position: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRequest {
    pub symbol: String,
    pub requested: RequestedAction,
    pub strategy_id: String,
    pub has_position: bool,
    /// Snapshot of the held position, when there is one.
    pub position: Option<crate::model::PositionSnapshot>,
    /// Raw signal strength supplied by the originating strategy, in [0, 1].
    pub candidate_signal: Option<f64>,
}

impl CandidateRequest {
    pub fn key(&self) -> DecisionKey {
        DecisionKey {
            symbol: self.symbol.clone(),
            requested: self.requested,
            strategy_id: self.strategy_id.clone(),
            has_position: self.has_position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub symbol: String,
    pub strategy_id: String,
    pub requested: RequestedAction,
    pub action: DecisionAction,
    pub score: f64,
    pub sub_scores: Vec<SourceScore>,
    pub reasons: Vec<String>,
    pub created_at_ms: i64,
}

impl Decision {
    pub fn reject(req: &CandidateRequest, code: DecisionRejectCode, reason: String) -> Self {
        Self {
            symbol: req.symbol.clone(),
            strategy_id: req.strategy_id.clone(),
            requested: req.requested,
            action: DecisionAction::Reject,
            score: 0.0,
            sub_scores: Vec::new(),
            reasons: vec![code.as_str().to_string(), reason],
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn internal_error(req: &CandidateRequest, msg: String) -> Self {
        Self {
            symbol: req.symbol.clone(),
            strategy_id: req.strategy_id.clone(),
            requested: req.requested,
            action: DecisionAction::Error,
            score: 0.0,
            sub_scores: Vec::new(),
            reasons: vec![msg],
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}
