/// Reward shaping thresholds and weights. Distances are in nautical miles,
/// angles in radians.
#[derive(Debug, Clone)]
pub struct RewardConfig {
    /// Separation below which the step is a collision
    pub collision_distance_nm: f64,
    /// Close-quarters separation tier
    pub near_distance_nm: f64,
    pub near_weight: f64,
    /// Closest-point-of-approach tier
    pub cpa_distance_nm: f64,
    pub cpa_weight: f64,
    /// Caution separation tier
    pub caution_distance_nm: f64,
    pub caution_weight: f64,
    /// Far tier: (distance - reference) / scale * weight
    pub far_reference_nm: f64,
    pub far_scale_nm: f64,
    pub far_weight: f64,
    /// Penalty per PI radians of deviation from the goal in the far tier
    pub heading_deviation_weight: f64,
    /// Scale of the COLREGS compliance term
    pub compliance_weight: f64,
    /// Rudder magnitude still counted as holding course
    pub stand_on_rudder_tolerance: f64,
    /// Transit ticks before the episode is cut as stagnant
    pub max_transit_steps: u32,
    /// Goal distance ratio above which the episode diverged
    pub divergence_ratio: f64,
    /// Goal distance ratio below which the goal counts as reached
    pub goal_reached_ratio: f64,
    /// Divisor of the heading alignment term in transit
    pub alignment_divisor: f64,
    /// Penalty per unit of sway velocity in transit
    pub drift_weight: f64,
    /// Pair distance at which a held encounter reverts to safe
    pub release_distance_nm: f64,
    /// Either coordinate beyond this ends the episode
    pub position_limit_nm: Option<f64>,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            collision_distance_nm: 0.5,
            near_distance_nm: 1.5,
            near_weight: 0.4,
            cpa_distance_nm: 1.0,
            cpa_weight: 0.4,
            caution_distance_nm: 3.0,
            caution_weight: 0.2,
            far_reference_nm: 5.0,
            far_scale_nm: 1.5,
            far_weight: 0.15,
            heading_deviation_weight: 0.05,
            compliance_weight: 0.1,
            stand_on_rudder_tolerance: 1f64.to_radians(),
            max_transit_steps: 1000,
            divergence_ratio: 2.0,
            goal_reached_ratio: 0.3,
            alignment_divisor: 3.0,
            drift_weight: 0.2,
            release_distance_nm: 6.0,
            position_limit_nm: Some(20.0),
        }
    }
}
