use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    Paper,
    Live,
}

impl StrategyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Live => "live",
        }
    }
}

/// Capital band ceilings for the paper rounds. Allocation at or above
/// `R2_CAPITAL_FLOOR_USD` is round two, at or above `R3_CAPITAL_FLOOR_USD`
/// is round three.
pub const R2_CAPITAL_FLOOR_USD: f64 = 5_000.0;
pub const R3_CAPITAL_FLOOR_USD: f64 = 25_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStage {
    R1,
    R2,
    R3,
    Live,
}

impl TournamentStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::R1 => "R1",
            Self::R2 => "R2",
            Self::R3 => "R3",
            Self::Live => "LIVE",
        }
    }
}

/// Derive the tournament stage from status and allocated capital.
///
/// The stage is never stored on the record; it is always recomputed here so
/// status, capital, and stage cannot drift apart.
pub fn stage_for(status: StrategyStatus, allocated_capital_usd: f64) -> TournamentStage {
    match status {
        StrategyStatus::Live => TournamentStage::Live,
        StrategyStatus::Paper => {
            if allocated_capital_usd >= R3_CAPITAL_FLOOR_USD {
                TournamentStage::R3
            } else if allocated_capital_usd >= R2_CAPITAL_FLOOR_USD {
                TournamentStage::R2
            } else {
                TournamentStage::R1
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyFamily {
    TrendFollowing,
    MeanReversion,
    Breakout,
}

impl StrategyFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrendFollowing => "trend_following",
            Self::MeanReversion => "mean_reversion",
            Self::Breakout => "breakout",
        }
    }

    pub fn all() -> [StrategyFamily; 3] {
        [Self::TrendFollowing, Self::MeanReversion, Self::Breakout]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Choice(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub trade_count: u32,
    pub win_rate_pct: f64,
    pub sharpe: f64,
    pub max_drawdown_pct: f64,
    pub total_return_pct: f64,
    pub breach_count: u32,
}

/// Promotion gate: every bound must hold simultaneously, no partial credit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromotionCriteria {
    pub min_trade_count: u32,
    pub min_win_rate_pct: f64,
    pub min_sharpe: f64,
    pub max_drawdown_pct: f64,
    pub min_total_return_pct: f64,
}

impl Default for PromotionCriteria {
    fn default() -> Self {
        Self {
            min_trade_count: 50,
            min_win_rate_pct: 55.0,
            min_sharpe: 1.0,
            max_drawdown_pct: 8.0,
            min_total_return_pct: 5.0,
        }
    }
}

impl PromotionCriteria {
    pub fn is_met(&self, perf: &PerformanceSnapshot) -> bool {
        perf.trade_count >= self.min_trade_count
            && perf.win_rate_pct >= self.min_win_rate_pct
            && perf.sharpe >= self.min_sharpe
            && perf.max_drawdown_pct <= self.max_drawdown_pct
            && perf.total_return_pct >= self.min_total_return_pct
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub id: String,
    pub label: String,
    pub status: StrategyStatus,
    pub allocated_capital_usd: f64,
    pub family: StrategyFamily,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub performance: PerformanceSnapshot,
    pub promotion_criteria: PromotionCriteria,
    #[serde(default)]
    pub exploration: bool,
    #[serde(default = "now_ms")]
    pub created_at_ms: i64,
    #[serde(default)]
    pub promoted_at_ms: Option<i64>,
    #[serde(default)]
    pub demoted_at_ms: Option<i64>,
    #[serde(default)]
    pub archived: bool,
}

impl StrategyRecord {
    pub fn new_paper(
        label: impl Into<String>,
        family: StrategyFamily,
        params: BTreeMap<String, ParamValue>,
        allocated_capital_usd: f64,
    ) -> Self {
        Self {
            id: format!("strat-{}", &uuid::Uuid::new_v4().to_string()[..8]),
            label: label.into(),
            status: StrategyStatus::Paper,
            allocated_capital_usd,
            family,
            params,
            performance: PerformanceSnapshot::default(),
            promotion_criteria: PromotionCriteria::default(),
            exploration: false,
            created_at_ms: now_ms(),
            promoted_at_ms: None,
            demoted_at_ms: None,
            archived: false,
        }
    }

    pub fn stage(&self) -> TournamentStage {
        stage_for(self.status, self.allocated_capital_usd)
    }

    pub fn is_live(&self) -> bool {
        self.status == StrategyStatus::Live && !self.archived
    }

    pub fn is_active(&self) -> bool {
        !self.archived
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionDirection {
    Promote,
    Demote,
}

impl TransitionDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Promote => "promote",
            Self::Demote => "demote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionReason {
    /// All threshold conditions matched during a performance update.
    Automatic,
    /// Operator override with a free-form reason.
    Manual { note: String },
}

/// Immutable audit entry for one promotion or demotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub strategy_id: String,
    pub direction: TransitionDirection,
    pub at_ms: i64,
    pub performance: PerformanceSnapshot,
    pub reason: TransitionReason,
}
