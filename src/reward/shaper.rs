use std::f64::consts::PI;

use tracing::debug;

use super::config::RewardConfig;
use crate::colregs::{EncounterCategory, MIN_RELATIVE_SPEED};
use crate::infra::{Vec2, nm};
use crate::scenario::AgentId;
use crate::state::PerAgentRuntimeState;

/// Another vessel as seen by the shaper this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub agent: AgentId,
    pub category: EncounterCategory,
    /// Current separation in working units
    pub distance: f64,
    /// Closest point of approach in working units
    pub cpa: f64,
    /// Seconds until the closest point of approach
    pub tcpa: f64,
}

/// Inputs of a single reward evaluation.
#[derive(Debug, Clone, Copy)]
pub struct StepInputs<'a> {
    pub contacts: &'a [Contact],
    pub position: Vec2,
    pub rudder_angle: f64,
    pub lateral_velocity: f64,
    pub goal_distance: f64,
    /// Angle between own velocity and the direction to the goal, radians
    pub angle_to_goal: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardMode {
    Transit,
    Avoidance,
}

/// Why an episode ended on this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Collision,
    Stagnation,
    Divergence,
    GoalReached,
    OutOfBounds,
}

impl Termination {
    pub fn as_str(self) -> &'static str {
        match self {
            Termination::Collision => "collision",
            Termination::Stagnation => "stagnation",
            Termination::Divergence => "divergence",
            Termination::GoalReached => "goal_reached",
            Termination::OutOfBounds => "out_of_bounds",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardOutcome {
    pub reward: f64,
    pub mode: RewardMode,
    pub termination: Option<Termination>,
}

impl RewardOutcome {
    fn terminal(reward: f64, mode: RewardMode, termination: Termination) -> Self {
        Self {
            reward,
            mode,
            termination: Some(termination),
        }
    }
}

/// Angle between the velocity and the direction to the goal. A vessel without
/// headway is treated as pointing directly away.
pub fn angle_to_goal(velocity: Vec2, to_goal: Vec2) -> f64 {
    if velocity.length() < MIN_RELATIVE_SPEED {
        return PI;
    }
    velocity.angle_to(&to_goal)
}

pub struct RewardShaper {
    config: RewardConfig,
}

impl RewardShaper {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Evaluates one step. Updates the avoidance flag and resets the step
    /// counter when leaving avoidance mode; the caller owns incrementing it.
    pub fn shape(
        &self,
        runtime: &mut PerAgentRuntimeState,
        inputs: &StepInputs<'_>,
    ) -> RewardOutcome {
        let avoidance = inputs.contacts.iter().any(|c| !c.category.is_safe());
        if runtime.avoidance && !avoidance {
            debug!(steps = runtime.step_count, "leaving avoidance mode, transit window restarts");
            runtime.step_count = 0;
        }
        runtime.avoidance = avoidance;

        let mode = if avoidance {
            RewardMode::Avoidance
        } else {
            RewardMode::Transit
        };

        if self.out_of_bounds(inputs.position) {
            return RewardOutcome::terminal(-1.0, mode, Termination::OutOfBounds);
        }

        match mode {
            RewardMode::Avoidance => self.shape_avoidance(inputs),
            RewardMode::Transit => self.shape_transit(runtime, inputs),
        }
    }

    fn out_of_bounds(&self, position: Vec2) -> bool {
        self.config
            .position_limit_nm
            .map(|limit| position.x.abs() > nm(limit) || position.y.abs() > nm(limit))
            .unwrap_or(false)
    }

    fn shape_avoidance(&self, inputs: &StepInputs<'_>) -> RewardOutcome {
        let cfg = &self.config;
        let relevant = inputs.contacts.iter().filter(|c| !c.category.is_safe());

        let mut nearest: Option<&Contact> = None;
        let mut tightest: Option<&Contact> = None;
        for contact in relevant {
            if nearest.is_none_or(|n| contact.distance < n.distance) {
                nearest = Some(contact);
            }
            if tightest.is_none_or(|t| contact.cpa < t.cpa) {
                tightest = Some(contact);
            }
        }
        let (Some(nearest), Some(tightest)) = (nearest, tightest) else {
            return self.shape_far(inputs, None);
        };

        let min_distance = nearest.distance;
        let min_cpa = tightest.cpa;

        if min_distance < nm(cfg.collision_distance_nm) {
            return RewardOutcome::terminal(-1.0, RewardMode::Avoidance, Termination::Collision);
        }

        let (shaping, category) = if min_distance < nm(cfg.near_distance_nm) {
            let near = nm(cfg.near_distance_nm);
            ((min_distance - near) / near * cfg.near_weight, nearest.category)
        } else if min_cpa < nm(cfg.cpa_distance_nm) {
            let threshold = nm(cfg.cpa_distance_nm);
            ((min_cpa - threshold) / threshold * cfg.cpa_weight, tightest.category)
        } else if min_distance < nm(cfg.caution_distance_nm) {
            let caution = nm(cfg.caution_distance_nm);
            ((min_distance - caution) / caution * cfg.caution_weight, nearest.category)
        } else {
            return self.shape_far(inputs, Some(nearest));
        };

        RewardOutcome {
            reward: shaping + self.compliance(category, inputs.rudder_angle),
            mode: RewardMode::Avoidance,
            termination: None,
        }
    }

    fn shape_far(&self, inputs: &StepInputs<'_>, nearest: Option<&Contact>) -> RewardOutcome {
        let cfg = &self.config;
        let (shaping, compliance) = match nearest {
            Some(contact) => (
                (contact.distance - nm(cfg.far_reference_nm)) / nm(cfg.far_scale_nm) * cfg.far_weight,
                self.compliance(contact.category, inputs.rudder_angle),
            ),
            None => (0.0, 0.0),
        };
        let deviation = cfg.heading_deviation_weight * inputs.angle_to_goal / PI;

        RewardOutcome {
            reward: shaping - deviation + compliance,
            mode: RewardMode::Avoidance,
            termination: None,
        }
    }

    fn shape_transit(
        &self,
        runtime: &PerAgentRuntimeState,
        inputs: &StepInputs<'_>,
    ) -> RewardOutcome {
        let cfg = &self.config;

        if runtime.step_count > cfg.max_transit_steps {
            return RewardOutcome::terminal(-1.0, RewardMode::Transit, Termination::Stagnation);
        }

        let initial = runtime.initial_goal_distance;
        let ratio = if initial > f64::EPSILON {
            inputs.goal_distance / initial
        } else {
            0.0
        };

        if ratio > cfg.divergence_ratio {
            return RewardOutcome::terminal(-1.0, RewardMode::Transit, Termination::Divergence);
        }
        if ratio < cfg.goal_reached_ratio {
            return RewardOutcome::terminal(1.0, RewardMode::Transit, Termination::GoalReached);
        }

        let alignment = inputs.angle_to_goal.cos() / cfg.alignment_divisor;
        let progress = 1.0 - ratio;
        let drift = cfg.drift_weight * inputs.lateral_velocity.abs();

        RewardOutcome {
            reward: alignment + progress - drift,
            mode: RewardMode::Transit,
            termination: None,
        }
    }

    /// COLREGS compliance of the current rudder angle. Positive rudder turns
    /// to starboard.
    ///
    /// Penalties scale with |rudder| rather than a signed `-weight * rudder`,
    /// so a give-way vessel turning to port is penalised instead of paid.
    pub fn compliance(&self, category: EncounterCategory, rudder_angle: f64) -> f64 {
        let weight = self.config.compliance_weight;
        if category.must_give_way() {
            if rudder_angle > 0.0 {
                weight * rudder_angle
            } else {
                -weight * rudder_angle.abs()
            }
        } else if category.must_stand_on() {
            if rudder_angle.abs() <= self.config.stand_on_rudder_tolerance {
                weight
            } else {
                -weight * rudder_angle.abs()
            }
        } else {
            0.0
        }
    }
}

impl Default for RewardShaper {
    fn default() -> Self {
        Self::new(RewardConfig::default())
    }
}
