use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    Trending,
    Choppy,
    Volatile,
    Unknown,
}

impl MarketRegime {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trending => "trending",
            Self::Choppy => "choppy",
            Self::Volatile => "volatile",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarEventKind {
    Earnings,
    RateDecision,
    MacroRelease,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub kind: CalendarEventKind,
    /// Symbol the event concerns, when symbol-specific (earnings).
    pub symbol: Option<String>,
    pub scheduled_at_ms: i64,
}

/// Immutable per-cycle snapshot of market and portfolio conditions.
///
/// Recomputed each cycle and passed down by value; nothing in the core
/// mutates it after capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub regime: MarketRegime,
    /// Volatility index level (VIX-style).
    pub vix: f64,
    /// Directional strength in [0, 1].
    pub trend_strength: f64,
    /// Aggregate portfolio return for the current period, percent.
    pub portfolio_return_pct: f64,
    /// Age of the newest underlying market data point.
    pub data_age_ms: u64,
    #[serde(default)]
    pub calendar: Vec<CalendarEvent>,
    pub captured_at_ms: i64,
}

impl MarketContext {
    /// Neutral context used when no provider data is available yet.
    pub fn unknown(captured_at_ms: i64) -> Self {
        Self {
            regime: MarketRegime::Unknown,
            vix: 0.0,
            trend_strength: 0.0,
            portfolio_return_pct: 0.0,
            data_age_ms: 0,
            calendar: Vec::new(),
            captured_at_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub qty: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub unrealized_pnl_pct: f64,
    pub opened_at_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub positions: Vec<PositionSnapshot>,
    pub equity_usd: f64,
    /// Deployed capital as a fraction of equity, percent.
    pub capital_utilization_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    pub paper_budget_used_usd: f64,
    pub paper_budget_total_usd: f64,
    pub roster_slots_used: u32,
    pub roster_slots_max: u32,
}

impl CapacitySnapshot {
    pub fn budget_utilization_pct(&self) -> f64 {
        if self.paper_budget_total_usd <= 0.0 {
            return 100.0;
        }
        (self.paper_budget_used_usd / self.paper_budget_total_usd) * 100.0
    }

    pub fn slot_utilization_pct(&self) -> f64 {
        if self.roster_slots_max == 0 {
            return 100.0;
        }
        (self.roster_slots_used as f64 / self.roster_slots_max as f64) * 100.0
    }

    pub fn free_slots(&self) -> u32 {
        self.roster_slots_max.saturating_sub(self.roster_slots_used)
    }
}
