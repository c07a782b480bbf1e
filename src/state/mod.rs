mod runtime_state;
mod ship_state;

pub use runtime_state::{EncounterTracker, OvertakingMode, PerAgentRuntimeState};
pub use ship_state::{INITIAL_PROPELLER_SPEED, ShipSnapshot, ShipState};
