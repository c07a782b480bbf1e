//! Encounter geometry: COLREGS-style classification and closest point of
//! approach.

mod cpa;
mod encounter;

pub use cpa::{MIN_RELATIVE_SPEED, closest_approach, time_to_closest_approach};
pub use encounter::{
    EncounterCategory, EncounterGeometry, PROXIMITY_WINDOW_NM, classify, classify_geometry,
    relative_geometry,
};
