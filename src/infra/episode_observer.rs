use crate::colregs::EncounterCategory;
use crate::reward::{RewardOutcome, Termination};
use crate::scenario::{AgentConfig, AgentId};
use crate::state::ShipState;

/// Trait for observing episode events of one agent
pub trait EpisodeObserver: Send {
    /// Called when the agent has consumed its configuration
    fn on_episode_start(&mut self, agent: AgentId, generation: u64, config: &AgentConfig);

    /// Called when the held category of a pair changes
    fn on_encounter_changed(
        &mut self,
        agent: AgentId,
        other: AgentId,
        previous: EncounterCategory,
        current: EncounterCategory,
    );

    /// Called after every evaluated step
    fn on_step(&mut self, _agent: AgentId, _tick: u64, _outcome: &RewardOutcome, _state: &ShipState) {
        // Default implementation does nothing
    }

    /// Called when the episode ends, `termination` is `None` when it was cut
    /// short by the scenario barrier or a bridge failure
    fn on_episode_end(
        &mut self,
        agent: AgentId,
        tick: u64,
        termination: Option<Termination>,
        total_reward: f64,
    );
}
