//! Scenario catalog and the shared manager that synchronises agents.

mod catalog;
mod manager;

pub use catalog::{AgentConfig, CatalogError, Scenario, ScenarioCatalog};
pub use manager::{
    AgentId, BarrierOutcome, ScenarioError, ScenarioManager, SharedScenarioManager, lock,
};
