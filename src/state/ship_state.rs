use crate::infra::{DynamicsResponse, Vec2, nm};
use crate::scenario::AgentConfig;

/// Propeller speed the dynamics model starts every episode with.
pub const INITIAL_PROPELLER_SPEED: f64 = 17.95;

/// Kinematic state of a controlled vessel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShipState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub yaw: f64,
    pub yaw_rate: f64,
    pub rudder_angle: f64,
    pub propeller_speed: f64,
}

impl ShipState {
    /// State at episode start: configured pose, at rest, rudder amidships.
    pub fn spawn(config: &AgentConfig) -> Self {
        Self {
            position: Vec2::new(nm(config.x), nm(config.y)),
            velocity: Vec2::ZERO,
            yaw: config.yaw.to_radians(),
            yaw_rate: 0.0,
            rudder_angle: 0.0,
            propeller_speed: INITIAL_PROPELLER_SPEED,
        }
    }

    /// Next state as reported by the dynamics bridge. Body-frame surge and
    /// sway are rotated into the planar frame with the reported heading.
    pub fn advanced(&self, response: &DynamicsResponse) -> Self {
        Self {
            position: Vec2::new(response.x, response.y),
            velocity: Vec2::from_body_frame(response.u, response.v, response.heading),
            yaw: response.heading,
            yaw_rate: response.r,
            rudder_angle: response.rudder,
            propeller_speed: self.propeller_speed,
        }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }

    /// Sway component of the velocity, positive to starboard.
    pub fn lateral_velocity(&self) -> f64 {
        self.velocity.to_body_frame(self.yaw).1
    }

    pub fn snapshot(&self) -> ShipSnapshot {
        ShipSnapshot {
            position: self.position,
            velocity: self.velocity,
            heading: self.yaw,
        }
    }
}

/// The part of a vessel's state other agents are allowed to see.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShipSnapshot {
    pub position: Vec2,
    pub velocity: Vec2,
    pub heading: f64,
}
