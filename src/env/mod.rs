mod controller;
mod metrics;
mod observation;
mod runner;

pub use controller::{
    Agent, AgentError, AgentStepController, ControllerConfig, StepInfo, StepResult,
};
pub use metrics::{RunMetrics, ScenarioStats};
pub use observation::{EncoderConfig, OBSERVATION_SIZE, ObservationEncoder};
pub use runner::{BaselinePolicy, RunError, Runner, RunnerConfig};
