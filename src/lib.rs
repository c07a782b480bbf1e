pub mod colregs;
pub mod config;
pub mod env;
pub mod infra;
pub mod reward;
pub mod scenario;
pub mod state;

// Re-export commonly used types for convenience
pub use colregs::{EncounterCategory, classify, closest_approach};
pub use env::{Agent, AgentStepController};
pub use reward::RewardShaper;
pub use scenario::{ScenarioCatalog, ScenarioManager};
