use std::collections::HashMap;

use crate::colregs::EncounterCategory;
use crate::scenario::AgentId;

/// Overtaking situation reported to the dynamics side with every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OvertakingMode {
    #[default]
    None,
    Overtaking,
    Overtaken,
}

impl OvertakingMode {
    pub fn wire_value(self) -> i32 {
        match self {
            OvertakingMode::None => 0,
            OvertakingMode::Overtaking => 1,
            OvertakingMode::Overtaken => -1,
        }
    }

    /// Overtaking wins over overtaken when both are tracked.
    pub fn from_categories(categories: impl IntoIterator<Item = EncounterCategory>) -> Self {
        let mut mode = OvertakingMode::None;
        for category in categories {
            match category {
                EncounterCategory::Overtaking => return OvertakingMode::Overtaking,
                EncounterCategory::Overtaken => mode = OvertakingMode::Overtaken,
                _ => {}
            }
        }
        mode
    }
}

/// Sticky per-pair encounter categories.
///
/// A non-safe category is held until the pair opens beyond the release
/// distance, then reverts to safe. Safe pairs are re-classified every tick.
#[derive(Debug, Clone, Default)]
pub struct EncounterTracker {
    categories: HashMap<AgentId, EncounterCategory>,
}

impl EncounterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the category for `other` this tick. `classify` is only called
    /// when the pair is eligible for re-classification.
    pub fn update<F>(
        &mut self,
        other: AgentId,
        distance: f64,
        release_distance: f64,
        classify: F,
    ) -> EncounterCategory
    where
        F: FnOnce() -> EncounterCategory,
    {
        let category = match self.categories.get(&other) {
            Some(held) if !held.is_safe() => {
                if distance > release_distance {
                    EncounterCategory::SafeEncounter
                } else {
                    *held
                }
            }
            _ => classify(),
        };
        self.categories.insert(other, category);
        category
    }

    pub fn get(&self, other: AgentId) -> EncounterCategory {
        self.categories.get(&other).copied().unwrap_or_default()
    }

    /// Drops pairs whose other agent is no longer participating.
    pub fn retain_agents(&mut self, present: &[AgentId]) {
        self.categories.retain(|id, _| present.contains(id));
    }

    pub fn any_risk(&self) -> bool {
        self.categories.values().any(|c| !c.is_safe())
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, EncounterCategory)> + '_ {
        self.categories.iter().map(|(id, c)| (*id, *c))
    }

    pub fn clear(&mut self) {
        self.categories.clear();
    }
}

/// Per-agent, per-episode bookkeeping owned by the step controller and passed
/// explicitly into the reward shaper.
#[derive(Debug, Clone, Default)]
pub struct PerAgentRuntimeState {
    pub encounters: EncounterTracker,
    pub avoidance: bool,
    pub overtaking_mode: OvertakingMode,
    pub step_count: u32,
    pub episode_started: bool,
    pub episode_ended: bool,
    pub initial_goal_distance: f64,
}

impl PerAgentRuntimeState {
    pub fn begin(initial_goal_distance: f64) -> Self {
        Self {
            episode_started: true,
            initial_goal_distance,
            ..Self::default()
        }
    }
}
