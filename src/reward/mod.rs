//! Per-step reward shaping: transit toward the goal, or collision avoidance
//! with COLREGS compliance when any tracked vessel is a risk.

mod config;
mod shaper;

pub use config::RewardConfig;
pub use shaper::{
    Contact, RewardMode, RewardOutcome, RewardShaper, StepInputs, Termination, angle_to_goal,
};
