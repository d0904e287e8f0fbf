pub mod market;
pub mod strategy;

pub use market::{
    AccountSnapshot, CalendarEvent, CalendarEventKind, CapacitySnapshot, MarketContext,
    MarketRegime, PositionSnapshot,
};
pub use strategy::{
    stage_for, ParamValue, PerformanceSnapshot, PromotionCriteria, StrategyFamily, StrategyRecord,
    StrategyStatus, TournamentStage, TransitionDirection, TransitionReason, TransitionRecord,
    R2_CAPITAL_FLOOR_USD, R3_CAPITAL_FLOOR_USD,
};
