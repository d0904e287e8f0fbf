pub mod audit;
pub mod config;
pub mod decision;
pub mod error;
pub mod events;
pub mod hours;
pub mod lifecycle;
pub mod market;
pub mod model;
pub mod orchestrator;
pub mod phenotype;
pub mod sim;
pub mod status;
pub mod trigger;
