pub mod manager;
pub mod store;

pub use manager::StrategyLifecycleManager;
pub use store::{JsonFileStore, MemoryStore, StrategyStore};
