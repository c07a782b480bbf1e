use tracing::{debug, info};

use super::episode_observer::EpisodeObserver;
use super::types::to_nm;
use crate::colregs::EncounterCategory;
use crate::reward::{RewardOutcome, Termination};
use crate::scenario::{AgentConfig, AgentId};
use crate::state::ShipState;

pub struct LoggingObserver;

impl EpisodeObserver for LoggingObserver {
    fn on_episode_start(&mut self, agent: AgentId, generation: u64, config: &AgentConfig) {
        info!(
            agent,
            generation,
            "episode started at ({:.2}, {:.2}) nm, yaw {:.1} deg",
            config.x,
            config.y,
            config.yaw
        );
    }

    fn on_encounter_changed(
        &mut self,
        agent: AgentId,
        other: AgentId,
        previous: EncounterCategory,
        current: EncounterCategory,
    ) {
        info!(agent, other, "encounter {:?} -> {:?}", previous, current);
    }

    fn on_step(&mut self, agent: AgentId, tick: u64, outcome: &RewardOutcome, state: &ShipState) {
        debug!(
            agent,
            tick,
            mode = ?outcome.mode,
            reward = outcome.reward,
            "pos: ({:.3}, {:.3}) nm, yaw: {:.3}, rudder: {:.3}",
            to_nm(state.position.x),
            to_nm(state.position.y),
            state.yaw,
            state.rudder_angle
        );
    }

    fn on_episode_end(
        &mut self,
        agent: AgentId,
        tick: u64,
        termination: Option<Termination>,
        total_reward: f64,
    ) {
        let reason = termination.map_or("interrupted", Termination::as_str);
        info!(agent, tick, total_reward, "episode finished: {}", reason);
    }
}
