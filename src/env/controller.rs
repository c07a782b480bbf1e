//! Per-agent step orchestration

use std::future::Future;

use thiserror::Error;
use tracing::{debug, error, info};

use super::observation::ObservationEncoder;
use crate::colregs::{closest_approach, classify, time_to_closest_approach};
use crate::infra::{ControlCommand, DynamicsBridge, EpisodeObserver, ProtocolError, Vec2, nm};
use crate::reward::{Contact, RewardMode, RewardShaper, StepInputs, Termination, angle_to_goal};
use crate::scenario::{
    AgentId, BarrierOutcome, ScenarioError, SharedScenarioManager, lock,
};
use crate::state::{OvertakingMode, PerAgentRuntimeState, ShipSnapshot, ShipState};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent {agent} has no episode in progress")]
    NotStarted { agent: AgentId },
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error("dynamics bridge failed for agent {agent} (scenario {scenario:?}, tick {tick})")]
    Protocol {
        agent: AgentId,
        scenario: Option<usize>,
        tick: u64,
        #[source]
        source: ProtocolError,
    },
}

/// Controller settings that are not reward shaping.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Sent to the dynamics side at every episode start
    pub base_speed: f64,
    /// Goal distance ahead of the spawn pose when a scenario names none
    pub goal_distance_nm: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_speed: 50.0,
            goal_distance_nm: 5.0,
        }
    }
}

/// Additional information from a step
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    pub tick: u64,
    pub mode: Option<RewardMode>,
    /// Nearest risk contact, working units
    pub min_distance: Option<f64>,
    /// Smallest CPA among risk contacts, working units
    pub min_cpa: Option<f64>,
    pub overtaking_mode: OvertakingMode,
    /// Set when the episode ended and the barrier was consulted
    pub barrier: Option<BarrierOutcome>,
    /// Episode was ended from outside while the step was in flight
    pub interrupted: bool,
}

/// Step result of one agent
#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Vec<f32>,
    pub reward: f64,
    pub done: bool,
    pub termination: Option<Termination>,
    pub info: StepInfo,
}

/// Capability the driving framework uses, independent of any engine.
pub trait Agent {
    /// Starts the agent's episode. `None` when the agent has no
    /// configuration in the current scenario instance.
    fn begin_episode(&mut self) -> impl Future<Output = Result<Option<Vec<f32>>, AgentError>> + Send;

    /// Applies one rudder command and returns the shaped outcome.
    fn step(&mut self, rudder: f64) -> impl Future<Output = Result<StepResult, AgentError>> + Send;
}

pub struct AgentStepController<B: DynamicsBridge> {
    id: AgentId,
    bridge: B,
    manager: SharedScenarioManager,
    shaper: RewardShaper,
    encoder: ObservationEncoder,
    config: ControllerConfig,
    observer: Box<dyn EpisodeObserver>,
    ship: ShipState,
    goal: Vec2,
    runtime: PerAgentRuntimeState,
    contacts: Vec<Contact>,
    generation: u64,
    scenario: Option<usize>,
    tick: u64,
    episode_reward: f64,
}

impl<B: DynamicsBridge> AgentStepController<B> {
    pub fn new(
        id: AgentId,
        bridge: B,
        manager: SharedScenarioManager,
        shaper: RewardShaper,
        config: ControllerConfig,
        observer: impl EpisodeObserver + 'static,
    ) -> Self {
        Self {
            id,
            bridge,
            manager,
            shaper,
            encoder: ObservationEncoder::default(),
            config,
            observer: Box::new(observer),
            ship: ShipState {
                position: Vec2::ZERO,
                velocity: Vec2::ZERO,
                yaw: 0.0,
                yaw_rate: 0.0,
                rudder_angle: 0.0,
                propeller_speed: 0.0,
            },
            goal: Vec2::ZERO,
            runtime: PerAgentRuntimeState::default(),
            contacts: Vec::new(),
            generation: 0,
            scenario: None,
            tick: 0,
            episode_reward: 0.0,
        }
    }

    pub fn with_encoder(mut self, encoder: ObservationEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn ship(&self) -> &ShipState {
        &self.ship
    }

    pub fn goal(&self) -> Vec2 {
        self.goal
    }

    pub fn runtime(&self) -> &PerAgentRuntimeState {
        &self.runtime
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn episode_reward(&self) -> f64 {
        self.episode_reward
    }

    /// Generation of the scenario instance the current episode belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn in_episode(&self) -> bool {
        self.runtime.episode_started && !self.runtime.episode_ended
    }

    fn observe(&self) -> Vec<f32> {
        let nearest = self
            .contacts
            .iter()
            .filter(|c| !c.category.is_safe())
            .min_by(|a, b| a.distance.total_cmp(&b.distance));
        self.encoder
            .encode(&self.ship, self.goal, self.runtime.avoidance, nearest)
    }

    /// Re-evaluates every pair against last tick's snapshot of the others,
    /// holding non-safe categories until the pair opens past the release
    /// distance.
    fn track_encounters(&mut self, others: &[(AgentId, ShipSnapshot)]) {
        let present: Vec<AgentId> = others.iter().map(|(id, _)| *id).collect();
        self.runtime.encounters.retain_agents(&present);

        let release = nm(self.shaper.config().release_distance_nm);
        let ship = self.ship;
        self.contacts.clear();

        for (other, snapshot) in others {
            let distance = ship.position.distance(&snapshot.position);
            let previous = self.runtime.encounters.get(*other);
            let category = self.runtime.encounters.update(*other, distance, release, || {
                classify(ship.position, ship.yaw, snapshot.position, snapshot.heading)
            });
            if category != previous {
                self.observer
                    .on_encounter_changed(self.id, *other, previous, category);
            }

            self.contacts.push(Contact {
                agent: *other,
                category,
                distance,
                cpa: closest_approach(
                    ship.position,
                    ship.velocity,
                    snapshot.position,
                    snapshot.velocity,
                ),
                tcpa: time_to_closest_approach(
                    ship.position,
                    ship.velocity,
                    snapshot.position,
                    snapshot.velocity,
                ),
            });
        }
    }

    fn interrupted(&self) -> Result<bool, AgentError> {
        Ok(lock(&self.manager)?.generation() != self.generation)
    }

    /// The scenario was rotated under this agent; any in-flight response is
    /// dropped and the episode closes without reward.
    fn finish_interrupted(&mut self) -> StepResult {
        debug!(agent = self.id, tick = self.tick, "episode force-ended by scenario rotation");
        self.runtime.episode_ended = true;
        self.observer
            .on_episode_end(self.id, self.tick, None, self.episode_reward);
        StepResult {
            observation: self.observe(),
            reward: 0.0,
            done: true,
            termination: None,
            info: StepInfo {
                tick: self.tick,
                interrupted: true,
                ..StepInfo::default()
            },
        }
    }

    /// Ends the episode after a bridge failure without crediting a reward.
    fn fail(&mut self, source: ProtocolError) -> AgentError {
        error!(
            agent = self.id,
            scenario = ?self.scenario,
            tick = self.tick,
            "dynamics bridge failure: {}",
            source
        );
        self.runtime.episode_ended = true;
        self.observer
            .on_episode_end(self.id, self.tick, None, self.episode_reward);

        match lock(&self.manager) {
            Ok(mut manager) => {
                if manager.generation() == self.generation
                    && let Err(err) = manager.report_agent_ended(self.id)
                {
                    error!(agent = self.id, "failed to report ended agent: {}", err);
                }
            }
            Err(err) => error!(agent = self.id, "failed to report ended agent: {}", err),
        }

        AgentError::Protocol {
            agent: self.id,
            scenario: self.scenario,
            tick: self.tick,
            source,
        }
    }
}

impl<B: DynamicsBridge> Agent for AgentStepController<B> {
    async fn begin_episode(&mut self) -> Result<Option<Vec<f32>>, AgentError> {
        let (config, generation, scenario) = {
            let mut manager = lock(&self.manager)?;
            (
                manager.dispense_config(self.id),
                manager.generation(),
                manager.current_index(),
            )
        };
        let Some(config) = config else {
            return Ok(None);
        };

        self.ship = ShipState::spawn(&config);
        self.goal = config.goal_position(self.config.goal_distance_nm);
        self.runtime = PerAgentRuntimeState::begin(self.ship.position.distance(&self.goal));
        self.contacts.clear();
        self.generation = generation;
        self.scenario = scenario;
        self.tick = 0;
        self.episode_reward = 0.0;

        if let Err(source) = self.bridge.initialize(self.config.base_speed).await {
            return Err(self.fail(source));
        }

        lock(&self.manager)?.commit_snapshot(self.id, self.tick, self.ship.snapshot());
        self.observer.on_episode_start(self.id, generation, &config);
        info!(
            agent = self.id,
            generation,
            scenario = ?scenario,
            "episode begun, goal {:.2} nm away",
            crate::infra::to_nm(self.runtime.initial_goal_distance)
        );

        Ok(Some(self.observe()))
    }

    async fn step(&mut self, rudder: f64) -> Result<StepResult, AgentError> {
        if !self.in_episode() {
            return Err(AgentError::NotStarted { agent: self.id });
        }
        if self.interrupted()? {
            return Ok(self.finish_interrupted());
        }

        self.tick += 1;
        let others = lock(&self.manager)?.snapshot_other_agents(self.id, self.tick);
        self.track_encounters(&others);

        let overtaking_mode =
            OvertakingMode::from_categories(self.contacts.iter().map(|c| c.category));
        self.runtime.overtaking_mode = overtaking_mode;
        let command = ControlCommand {
            rudder,
            overtaking_mode,
        };

        let next = match self.bridge.advance(&self.ship, command).await {
            Ok(next) => next,
            Err(source) => return Err(self.fail(source)),
        };

        self.runtime.step_count += 1;
        let to_goal = self.goal - next.position;
        let inputs = StepInputs {
            contacts: &self.contacts,
            position: next.position,
            rudder_angle: next.rudder_angle,
            lateral_velocity: next.lateral_velocity(),
            goal_distance: to_goal.length(),
            angle_to_goal: angle_to_goal(next.velocity, to_goal),
        };
        let outcome = self.shaper.shape(&mut self.runtime, &inputs);

        // Generation check, commit and end report share one lock.
        let barrier = {
            let mut manager = lock(&self.manager)?;
            if manager.generation() != self.generation {
                None
            } else {
                manager.commit_snapshot(self.id, self.tick, next.snapshot());
                match outcome.termination {
                    Some(_) => {
                        self.runtime.episode_ended = true;
                        Some(Some(manager.report_agent_ended(self.id)?))
                    }
                    None => Some(None),
                }
            }
        };
        let Some(barrier) = barrier else {
            return Ok(self.finish_interrupted());
        };

        self.ship = next;
        self.episode_reward += outcome.reward;

        self.observer
            .on_step(self.id, self.tick, &outcome, &self.ship);
        if let Some(termination) = outcome.termination {
            self.runtime.episode_ended = true;
            self.observer.on_episode_end(
                self.id,
                self.tick,
                Some(termination),
                self.episode_reward,
            );
        }

        let risk = self.contacts.iter().filter(|c| !c.category.is_safe());
        let min_distance = risk.clone().map(|c| c.distance).reduce(f64::min);
        let min_cpa = risk.map(|c| c.cpa).reduce(f64::min);

        Ok(StepResult {
            observation: self.observe(),
            reward: outcome.reward,
            done: outcome.termination.is_some(),
            termination: outcome.termination,
            info: StepInfo {
                tick: self.tick,
                mode: Some(outcome.mode),
                min_distance,
                min_cpa,
                overtaking_mode,
                barrier,
                interrupted: false,
            },
        })
    }
}
