//! Vector observation of one agent

use std::f64::consts::PI;

use crate::infra::{Vec2, nm};
use crate::reward::Contact;
use crate::state::ShipState;

/// Number of values in an encoded observation.
pub const OBSERVATION_SIZE: usize = 9;

/// Encoder configuration
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Speed that maps to 1.0, working units per second
    pub speed_standard: f64,
    /// Full rudder deflection in radians
    pub max_rudder: f64,
    /// Distance and CPA normalisation in nautical miles
    pub range_nm: f64,
    /// TCPA that maps to 1.0, seconds
    pub tcpa_horizon: f64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            speed_standard: 10.0,
            max_rudder: 35f64.to_radians(),
            range_nm: 5.0,
            tcpa_horizon: 600.0,
        }
    }
}

pub struct ObservationEncoder {
    config: EncoderConfig,
}

impl ObservationEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Encodes own kinematics, the goal and the nearest risk contact.
    pub fn encode(
        &self,
        ship: &ShipState,
        goal: Vec2,
        avoidance: bool,
        nearest: Option<&Contact>,
    ) -> Vec<f32> {
        let cfg = &self.config;
        let (forward, lateral) = (goal - ship.position).to_body_frame(ship.yaw);
        let bearing_to_goal = lateral.atan2(forward) / PI;
        let course = if ship.speed() > 0.0 {
            ship.velocity.heading() / PI
        } else {
            0.0
        };
        let range = nm(cfg.range_nm);

        let (distance, cpa, tcpa) = match nearest {
            Some(contact) => (
                (contact.distance / range).min(1.0),
                (contact.cpa / range).min(1.0),
                (contact.tcpa / cfg.tcpa_horizon).clamp(-1.0, 1.0),
            ),
            None => (1.0, 1.0, 0.0),
        };

        [
            bearing_to_goal,
            ship.speed() / cfg.speed_standard,
            course,
            ship.yaw_rate / PI,
            ship.rudder_angle / cfg.max_rudder,
            if avoidance { 1.0 } else { 0.0 },
            distance,
            cpa,
            tcpa,
        ]
        .iter()
        .map(|v| *v as f32)
        .collect()
    }

    /// Index of the avoidance flag in an encoded observation.
    pub const AVOIDANCE_INDEX: usize = 5;
    /// Index of the bearing to the goal.
    pub const GOAL_BEARING_INDEX: usize = 0;
}

impl Default for ObservationEncoder {
    fn default() -> Self {
        Self::new(EncoderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colregs::EncounterCategory;
    use crate::scenario::AgentConfig;

    #[test]
    fn test_observation_size_and_goal_bearing() {
        let encoder = ObservationEncoder::default();
        let ship = ShipState::spawn(&AgentConfig::new(0.0, 0.0, 0.0));

        // Goal broad on the starboard beam.
        let obs = encoder.encode(&ship, Vec2::new(0.0, nm(2.0)), false, None);
        assert_eq!(obs.len(), OBSERVATION_SIZE);
        assert!((obs[0] - 0.5).abs() < 1e-6);
        assert_eq!(obs[1], 0.0);
        assert_eq!(obs[5], 0.0);
        assert_eq!(&obs[6..], &[1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_contact_features_are_clamped() {
        let encoder = ObservationEncoder::default();
        let ship = ShipState::spawn(&AgentConfig::new(0.0, 0.0, 0.0));
        let contact = Contact {
            agent: 1,
            category: EncounterCategory::HeadOn,
            distance: nm(2.5),
            cpa: nm(12.0),
            tcpa: -1200.0,
        };
        let obs = encoder.encode(&ship, Vec2::new(nm(5.0), 0.0), true, Some(&contact));
        assert_eq!(obs[5], 1.0);
        assert!((obs[6] - 0.5).abs() < 1e-6);
        assert_eq!(obs[7], 1.0);
        assert_eq!(obs[8], -1.0);
    }
}
