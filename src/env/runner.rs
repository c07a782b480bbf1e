//! Lockstep driver for all agents of a run

use std::f64::consts::PI;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use super::controller::{Agent, AgentError, AgentStepController, StepResult};
use super::metrics::RunMetrics;
use super::observation::ObservationEncoder;
use crate::infra::{DynamicsBridge, EpisodeLog, EpisodeRecord};
use crate::reward::Termination;
use crate::scenario::{ScenarioError, SharedScenarioManager, lock};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error("agent task failed: {0}")]
    Task(#[from] JoinError),
}

/// Steers toward the goal, with a starboard bias while any contact is a risk.
#[derive(Debug, Clone)]
pub struct BaselinePolicy {
    /// Rudder per radian of goal bearing
    pub gain: f64,
    /// Extra starboard rudder in avoidance mode, radians
    pub starboard_bias: f64,
    pub max_rudder: f64,
}

impl Default for BaselinePolicy {
    fn default() -> Self {
        Self {
            gain: 0.8,
            starboard_bias: 10f64.to_radians(),
            max_rudder: 35f64.to_radians(),
        }
    }
}

impl BaselinePolicy {
    pub fn rudder(&self, observation: &[f32]) -> f64 {
        let bearing = observation
            .get(ObservationEncoder::GOAL_BEARING_INDEX)
            .map_or(0.0, |b| *b as f64 * PI);
        let avoidance = observation
            .get(ObservationEncoder::AVOIDANCE_INDEX)
            .is_some_and(|flag| *flag > 0.5);

        let mut rudder = self.gain * bearing;
        if avoidance {
            rudder += self.starboard_bias;
        }
        rudder.clamp(-self.max_rudder, self.max_rudder)
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Scenario rotations to run before stopping
    pub episodes: u64,
    /// Ticks after which a scenario instance is force-ended
    pub max_ticks: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            episodes: 10,
            max_ticks: 5000,
        }
    }
}

/// Per-agent bookkeeping kept by the runner between ticks.
#[derive(Debug, Default)]
struct Seat {
    observation: Option<Vec<f32>>,
    scenario: String,
    generation: u64,
}

enum TickOutcome {
    Idle,
    Began(Vec<f32>),
    Stepped(StepResult),
}

pub struct Runner<B: DynamicsBridge> {
    controllers: Vec<Option<AgentStepController<B>>>,
    seats: Vec<Seat>,
    manager: SharedScenarioManager,
    policy: BaselinePolicy,
    config: RunnerConfig,
    metrics: RunMetrics,
    log: Option<EpisodeLog>,
    rotations: watch::Sender<u64>,
}

impl<B: DynamicsBridge + 'static> Runner<B> {
    pub fn new(
        controllers: Vec<AgentStepController<B>>,
        manager: SharedScenarioManager,
        policy: BaselinePolicy,
        config: RunnerConfig,
    ) -> Self {
        let seats = controllers.iter().map(|_| Seat::default()).collect();
        let (rotations, _) = watch::channel(0);
        Self {
            controllers: controllers.into_iter().map(Some).collect(),
            seats,
            manager,
            policy,
            config,
            metrics: RunMetrics::default(),
            log: None,
            rotations,
        }
    }

    pub fn with_episode_log(mut self, log: EpisodeLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Receives the number of completed scenario rotations.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.rotations.subscribe()
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Drives every agent tick by tick until the configured number of
    /// scenario rotations completed.
    pub async fn run(&mut self) -> Result<(), RunError> {
        let start = lock(&self.manager)?.generation();
        let mut instance_ticks = 0u64;
        let mut generation = start;

        loop {
            let rotations = generation - start;
            if rotations >= self.config.episodes {
                break;
            }

            let stepping = self
                .controllers
                .iter()
                .flatten()
                .any(AgentStepController::in_episode);
            let acted = self.tick(stepping).await?;

            if stepping {
                instance_ticks += 1;
            }
            let rotated = lock(&self.manager)?.generation() != generation;
            if !rotated && ((!stepping && acted == 0) || instance_ticks > self.config.max_ticks) {
                warn!(
                    generation,
                    ticks = instance_ticks,
                    "scenario instance is stuck, ending it for all agents"
                );
                lock(&self.manager)?.end_scenario_for_all()?;
            }

            let current = lock(&self.manager)?.generation();
            if current != generation {
                generation = current;
                instance_ticks = 0;
                self.rotations.send_replace(generation - start);
            }
        }

        info!(rotations = generation - start, "run finished");
        Ok(())
    }

    /// One lockstep tick. Agents in an episode step; when nobody is, every
    /// agent tries to begin. Returns how many agents acted.
    async fn tick(&mut self, stepping: bool) -> Result<usize, RunError> {
        let mut tasks = JoinSet::new();
        for (index, slot) in self.controllers.iter_mut().enumerate() {
            let Some(controller) = slot.take_if(|c| c.in_episode() == stepping) else {
                continue;
            };
            let rudder = self.seats[index]
                .observation
                .as_deref()
                .map_or(0.0, |obs| self.policy.rudder(obs));

            tasks.spawn(async move {
                let mut controller = controller;
                let outcome = if stepping {
                    controller.step(rudder).await.map(TickOutcome::Stepped)
                } else {
                    controller.begin_episode().await.map(|obs| match obs {
                        Some(obs) => TickOutcome::Began(obs),
                        None => TickOutcome::Idle,
                    })
                };
                (index, controller, outcome)
            });
        }

        let mut acted = 0;
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            let (index, controller, outcome) = joined?;
            let steps = controller.tick();
            let reward = controller.episode_reward();
            self.controllers[index] = Some(controller);

            match outcome {
                Ok(TickOutcome::Idle) => {}
                Ok(TickOutcome::Began(observation)) => {
                    acted += 1;
                    let manager = lock(&self.manager)?;
                    let seat = &mut self.seats[index];
                    seat.observation = Some(observation);
                    seat.generation = manager.generation();
                    seat.scenario = manager
                        .current_scenario()
                        .map(|s| s.name.clone())
                        .unwrap_or_default();
                }
                Ok(TickOutcome::Stepped(result)) => {
                    acted += 1;
                    self.seats[index].observation = Some(result.observation.clone());
                    if result.done {
                        self.finish_episode(index, steps, reward, result.termination);
                    }
                }
                Err(AgentError::Protocol { .. }) => {
                    acted += 1;
                    self.finish_episode(index, steps, reward, None);
                }
                Err(err) => failure = Some(err),
            }
        }

        match failure {
            Some(err) => Err(err.into()),
            None => Ok(acted),
        }
    }

    fn finish_episode(
        &mut self,
        index: usize,
        steps: u64,
        reward: f64,
        termination: Option<Termination>,
    ) {
        let seat = &mut self.seats[index];
        seat.observation = None;
        debug!(
            agent = index,
            scenario = %seat.scenario,
            steps,
            reward,
            termination = termination.map_or("interrupted", Termination::as_str),
            "episode finished"
        );
        self.metrics
            .record_episode(&seat.scenario, reward, steps, termination);

        if let Some(log) = self.log.as_mut() {
            let record = EpisodeRecord {
                generation: seat.generation,
                scenario: seat.scenario.clone(),
                agent: index,
                steps,
                total_reward: reward,
                termination,
            };
            if let Err(err) = log.append(&record) {
                warn!("failed to append to {}: {}", log.path().display(), err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ControllerConfig;
    use crate::infra::{ControlCommand, DynamicsResponse, LoggingObserver, ProtocolError, Vec2, nm};
    use crate::reward::{RewardConfig, RewardShaper};
    use crate::scenario::{AgentConfig, Scenario, ScenarioCatalog, ScenarioManager};
    use crate::state::ShipState;

    /// Turns by the commanded rudder and moves a fixed distance per tick.
    struct KinematicBridge {
        step: f64,
    }

    impl DynamicsBridge for KinematicBridge {
        async fn initialize(&mut self, _base_speed: f64) -> Result<(), ProtocolError> {
            Ok(())
        }

        async fn advance(
            &mut self,
            state: &ShipState,
            command: ControlCommand,
        ) -> Result<ShipState, ProtocolError> {
            let heading = state.yaw + command.rudder * 0.2;
            let position = state.position + Vec2::from_heading(heading) * self.step;
            Ok(state.advanced(&DynamicsResponse {
                u: self.step,
                v: 0.0,
                r: command.rudder * 0.2,
                x: position.x,
                y: position.y,
                heading,
                rudder: command.rudder,
            }))
        }
    }

    fn runner(scenarios: Vec<Scenario>, slots: usize, episodes: u64) -> Runner<KinematicBridge> {
        let mut manager =
            ScenarioManager::new(ScenarioCatalog::new(scenarios), slots, Some(7)).unwrap();
        manager.select_scenario().unwrap();
        let manager = manager.into_shared();
        let controllers = (0..slots)
            .map(|id| {
                AgentStepController::new(
                    id,
                    KinematicBridge { step: nm(0.1) },
                    manager.clone(),
                    RewardShaper::new(RewardConfig::default()),
                    ControllerConfig::default(),
                    LoggingObserver,
                )
            })
            .collect();
        Runner::new(
            controllers,
            manager,
            BaselinePolicy::default(),
            RunnerConfig {
                episodes,
                max_ticks: 500,
            },
        )
    }

    #[test]
    fn test_baseline_policy_biases_to_starboard() {
        let policy = BaselinePolicy::default();
        let mut obs = vec![0.0f32; super::super::observation::OBSERVATION_SIZE];
        assert_eq!(policy.rudder(&obs), 0.0);

        obs[ObservationEncoder::AVOIDANCE_INDEX] = 1.0;
        assert!((policy.rudder(&obs) - policy.starboard_bias).abs() < 1e-12);

        obs[ObservationEncoder::GOAL_BEARING_INDEX] = -1.0;
        assert_eq!(policy.rudder(&obs), -policy.max_rudder);
    }

    #[tokio::test]
    async fn test_runner_completes_rotations() {
        let mut runner = runner(
            vec![Scenario::new(
                "solo",
                vec![AgentConfig::new(0.0, 0.0, 0.0).with_goal(1.0, 0.5)],
            )],
            1,
            3,
        );
        let rotations = runner.subscribe();
        runner.run().await.unwrap();

        assert_eq!(*rotations.borrow(), 3);
        assert_eq!(runner.metrics().episodes, 3);
        assert_eq!(runner.metrics().count(Some(Termination::GoalReached)), 3);
    }

    #[tokio::test]
    async fn test_runner_with_idle_slots() {
        // Three slots, but the scenario only covers two agents, spaced
        // beyond the proximity window.
        let mut runner = runner(
            vec![Scenario::new(
                "pair",
                vec![
                    AgentConfig::new(0.0, 0.0, 0.0).with_goal(1.0, 0.0),
                    AgentConfig::new(0.0, 6.0, 0.0).with_goal(1.0, 6.0),
                ],
            )],
            3,
            2,
        );
        runner.run().await.unwrap();
        assert_eq!(runner.metrics().episodes, 4);
    }

    #[tokio::test]
    async fn test_tick_limit_spares_scenario_that_just_rotated() {
        // Straight run to a goal 1.05 nm ahead ends on its 8th tick, the
        // same tick the limit of 7 is exceeded.
        let mut runner = runner(
            vec![Scenario::new(
                "solo",
                vec![AgentConfig::new(0.0, 0.0, 0.0).with_goal(1.05, 0.0)],
            )],
            1,
            2,
        );
        runner.config.max_ticks = 7;
        let rotations = runner.subscribe();
        runner.run().await.unwrap();

        assert_eq!(*rotations.borrow(), 2);
        assert_eq!(runner.metrics().episodes, 2);
        assert_eq!(runner.metrics().count(Some(Termination::GoalReached)), 2);
    }

    #[tokio::test]
    async fn test_runner_forces_empty_scenario_to_rotate() {
        let mut runner = runner(vec![Scenario::new("empty", Vec::new())], 2, 2);
        runner.run().await.unwrap();
        assert_eq!(runner.metrics().episodes, 0);
    }
}
