use std::f64::consts::{FRAC_PI_2, PI};

use crate::infra::{Vec2, nm, wrap_angle};

/// Beyond this forward or lateral separation an encounter is always safe.
pub const PROXIMITY_WINDOW_NM: f64 = 5.0;

const DEAD_AHEAD: f64 = PI / 30.0;
const ASTERN: f64 = 5.0 * PI / 8.0;
const SIMILAR_HEADING: f64 = 3.0 * PI / 8.0;
const RECIPROCAL_HEADING: f64 = 29.0 * PI / 30.0;

/// COLREGS-style category of an encounter as seen by the observing vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncounterCategory {
    CrossingGiveWay,
    CrossingStandOn,
    Overtaking,
    Overtaken,
    HeadOn,
    #[default]
    SafeEncounter,
}

impl EncounterCategory {
    /// Wire index used by the dynamics side and in logs.
    pub fn index(self) -> i32 {
        match self {
            EncounterCategory::CrossingGiveWay => 0,
            EncounterCategory::CrossingStandOn => 1,
            EncounterCategory::Overtaking => 2,
            EncounterCategory::Overtaken => 3,
            EncounterCategory::HeadOn => 4,
            EncounterCategory::SafeEncounter => 5,
        }
    }

    pub fn is_safe(self) -> bool {
        self == EncounterCategory::SafeEncounter
    }

    /// True for encounters where the observing vessel is expected to alter
    /// course to starboard.
    pub fn must_give_way(self) -> bool {
        matches!(
            self,
            EncounterCategory::CrossingGiveWay
                | EncounterCategory::Overtaking
                | EncounterCategory::HeadOn
        )
    }

    /// True for encounters where the observing vessel is expected to hold
    /// course and speed.
    pub fn must_stand_on(self) -> bool {
        matches!(
            self,
            EncounterCategory::CrossingStandOn | EncounterCategory::Overtaken
        )
    }
}

/// Relative geometry of another vessel in the observer's body frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncounterGeometry {
    /// Distance along the observer's heading.
    pub forward: f64,
    /// Distance to starboard (negative to port).
    pub lateral: f64,
    /// Relative bearing, 0 dead ahead, positive to starboard.
    pub bearing: f64,
    /// Other heading minus own heading, wrapped into (-PI, PI].
    pub relative_heading: f64,
}

impl EncounterGeometry {
    pub fn within_window(&self) -> bool {
        let window = nm(PROXIMITY_WINDOW_NM);
        self.forward.abs() <= window && self.lateral.abs() <= window
    }
}

pub fn relative_geometry(
    self_position: Vec2,
    self_heading: f64,
    other_position: Vec2,
    other_heading: f64,
) -> EncounterGeometry {
    let (forward, lateral) = (other_position - self_position).to_body_frame(self_heading);
    EncounterGeometry {
        forward,
        lateral,
        bearing: lateral.atan2(forward),
        relative_heading: wrap_angle(other_heading - self_heading),
    }
}

/// Classifies the encounter between the observing vessel and another vessel.
pub fn classify(
    self_position: Vec2,
    self_heading: f64,
    other_position: Vec2,
    other_heading: f64,
) -> EncounterCategory {
    classify_geometry(&relative_geometry(
        self_position,
        self_heading,
        other_position,
        other_heading,
    ))
}

/// Applies the angular rules to precomputed geometry. The proximity window
/// takes precedence over every angular rule.
pub fn classify_geometry(geometry: &EncounterGeometry) -> EncounterCategory {
    if !geometry.within_window() {
        return EncounterCategory::SafeEncounter;
    }

    let bearing = geometry.bearing;
    let heading = geometry.relative_heading;

    if bearing.abs() >= ASTERN && heading.abs() < SIMILAR_HEADING {
        return EncounterCategory::Overtaken;
    }

    if (FRAC_PI_2..ASTERN).contains(&bearing) && (-SIMILAR_HEADING..=0.0).contains(&heading) {
        return EncounterCategory::CrossingGiveWay;
    }

    if bearing > DEAD_AHEAD && bearing < FRAC_PI_2 && heading <= 0.0 {
        return EncounterCategory::CrossingGiveWay;
    }

    if bearing > -FRAC_PI_2 && bearing < -DEAD_AHEAD && heading >= 0.0 {
        return EncounterCategory::CrossingStandOn;
    }

    if bearing <= -FRAC_PI_2 && bearing >= -ASTERN && (0.0..=SIMILAR_HEADING).contains(&heading) {
        return EncounterCategory::CrossingStandOn;
    }

    if bearing.abs() <= DEAD_AHEAD {
        return if heading.abs() >= RECIPROCAL_HEADING {
            EncounterCategory::HeadOn
        } else if heading > SIMILAR_HEADING {
            EncounterCategory::CrossingStandOn
        } else if heading < -SIMILAR_HEADING {
            EncounterCategory::CrossingGiveWay
        } else {
            EncounterCategory::Overtaking
        };
    }

    EncounterCategory::SafeEncounter
}
