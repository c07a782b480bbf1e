use std::sync::{Arc, Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::catalog::{AgentConfig, Scenario, ScenarioCatalog};
use crate::state::ShipSnapshot;

pub type AgentId = usize;

pub type SharedScenarioManager = Arc<Mutex<ScenarioManager>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("scenario catalog is empty, no episode can begin")]
    EmptyCatalog,
    #[error("agent {agent} is outside the {slots} configured agent slots")]
    UnknownAgent { agent: AgentId, slots: usize },
    #[error("scenario manager lock poisoned")]
    LockPoisoned,
}

/// Locks a shared manager, mapping poisoning to an error.
pub fn lock(manager: &SharedScenarioManager) -> Result<MutexGuard<'_, ScenarioManager>, ScenarioError> {
    manager.lock().map_err(|_| ScenarioError::LockPoisoned)
}

/// Result of reporting an agent's episode end to the barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierOutcome {
    /// Other active agents are still running.
    Waiting { remaining: usize },
    /// This report completed the barrier and a new scenario is current.
    Rotated { scenario_index: usize, generation: u64 },
}

/// Last two commits of one agent, tagged with the tick they belong to.
/// Readers at tick `t` only ever see a commit made at a tick before `t`.
#[derive(Debug, Clone, Copy, Default)]
struct SnapshotCell {
    previous: Option<ShipSnapshot>,
    latest: Option<(u64, ShipSnapshot)>,
}

impl SnapshotCell {
    fn commit(&mut self, tick: u64, snapshot: ShipSnapshot) {
        if let Some((latest_tick, latest)) = self.latest
            && latest_tick < tick
        {
            self.previous = Some(latest);
        }
        self.latest = Some((tick, snapshot));
    }

    fn visible_at(&self, tick: u64) -> Option<ShipSnapshot> {
        match self.latest {
            Some((committed, snapshot)) if committed < tick => Some(snapshot),
            Some(_) => self.previous,
            None => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct AgentSlot {
    active: bool,
    started: bool,
    ended: bool,
    snapshots: SnapshotCell,
}

/// Owns the scenario catalog, hands out spawn configurations and runs the
/// end-of-episode barrier for every agent sharing the current scenario.
pub struct ScenarioManager {
    catalog: ScenarioCatalog,
    rng: StdRng,
    slots: Vec<AgentSlot>,
    current: Option<usize>,
    generation: u64,
}

impl ScenarioManager {
    /// Creates a manager with `agent_slots` agents. No scenario is current
    /// until [`ScenarioManager::select_scenario`] runs.
    pub fn new(
        catalog: ScenarioCatalog,
        agent_slots: usize,
        seed: Option<u64>,
    ) -> Result<Self, ScenarioError> {
        if catalog.is_empty() {
            return Err(ScenarioError::EmptyCatalog);
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            catalog,
            rng,
            slots: vec![AgentSlot::default(); agent_slots],
            current: None,
            generation: 0,
        })
    }

    pub fn into_shared(self) -> SharedScenarioManager {
        Arc::new(Mutex::new(self))
    }

    /// Draws the next scenario uniformly, resets every agent's flags and
    /// activates the agents it covers.
    pub fn select_scenario(&mut self) -> Result<usize, ScenarioError> {
        if self.catalog.is_empty() {
            return Err(ScenarioError::EmptyCatalog);
        }
        let index = self.rng.random_range(0..self.catalog.len());
        self.current = Some(index);
        self.generation += 1;

        for slot in &mut self.slots {
            *slot = AgentSlot::default();
        }
        self.activate_agents();

        let scenario = &self.catalog.scenarios[index];
        if scenario.agent_count() > self.slots.len() {
            warn!(
                scenario = %scenario.name,
                agents = scenario.agent_count(),
                slots = self.slots.len(),
                "scenario has more agents than slots, extra entries ignored"
            );
        }
        info!(
            scenario = %scenario.name,
            index,
            generation = self.generation,
            agents = self.active_count(),
            "scenario selected"
        );
        Ok(index)
    }

    /// Enables the agents the current scenario has a configuration for and
    /// disables the rest.
    pub fn activate_agents(&mut self) {
        let count = self.current_scenario().map_or(0, Scenario::agent_count);
        for (id, slot) in self.slots.iter_mut().enumerate() {
            slot.active = id < count;
        }
    }

    /// Returns the agent's spawn configuration once per scenario instance.
    /// Repeated requests, inactive agents and unknown ids get `None`.
    pub fn dispense_config(&mut self, agent: AgentId) -> Option<AgentConfig> {
        let index = self.current?;
        let slot = self.slots.get_mut(agent)?;
        if !slot.active || slot.started {
            debug!(agent, started = slot.started, active = slot.active, "config request refused");
            return None;
        }
        let config = self.catalog.scenarios[index].agents.get(agent)?.clone();
        slot.started = true;
        Some(config)
    }

    /// Marks the agent ended. The report that leaves no active agent running
    /// ends the scenario for everyone and rotates to a new one.
    pub fn report_agent_ended(&mut self, agent: AgentId) -> Result<BarrierOutcome, ScenarioError> {
        let slots = self.slots.len();
        let slot = self
            .slots
            .get_mut(agent)
            .ok_or(ScenarioError::UnknownAgent { agent, slots })?;
        if !slot.active {
            debug!(agent, "end reported by inactive agent");
            return Ok(BarrierOutcome::Waiting {
                remaining: self.remaining(),
            });
        }
        slot.ended = true;

        let remaining = self.remaining();
        if remaining > 0 {
            debug!(agent, remaining, "agent ended, waiting for the rest");
            return Ok(BarrierOutcome::Waiting { remaining });
        }

        let scenario_index = self.end_scenario_for_all()?;
        Ok(BarrierOutcome::Rotated {
            scenario_index,
            generation: self.generation,
        })
    }

    /// Force-ends every active agent, then selects and activates a new
    /// scenario. Agents mid-tick notice through the generation counter.
    pub fn end_scenario_for_all(&mut self) -> Result<usize, ScenarioError> {
        for slot in self.slots.iter_mut().filter(|s| s.active) {
            slot.ended = true;
            slot.active = false;
        }
        info!(generation = self.generation, "scenario ended for all agents");
        self.select_scenario()
    }

    /// Last-tick state of every other agent still in the episode, as seen by
    /// a reader at `tick`.
    pub fn snapshot_other_agents(
        &self,
        requesting: AgentId,
        tick: u64,
    ) -> Vec<(AgentId, ShipSnapshot)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(id, slot)| *id != requesting && slot.active && slot.started && !slot.ended)
            .filter_map(|(id, slot)| slot.snapshots.visible_at(tick).map(|s| (id, s)))
            .collect()
    }

    /// Publishes the agent's state at the end of `tick`.
    pub fn commit_snapshot(&mut self, agent: AgentId, tick: u64, snapshot: ShipSnapshot) {
        if let Some(slot) = self.slots.get_mut(agent) {
            slot.snapshots.commit(tick, snapshot);
        }
    }

    fn remaining(&self) -> usize {
        self.slots.iter().filter(|s| s.active && !s.ended).count()
    }

    pub fn is_active(&self, agent: AgentId) -> bool {
        self.slots.get(agent).is_some_and(|s| s.active)
    }

    pub fn is_ended(&self, agent: AgentId) -> bool {
        self.slots.get(agent).is_some_and(|s| s.ended)
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }

    pub fn agent_slots(&self) -> usize {
        self.slots.len()
    }

    /// Incremented by every scenario selection.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_scenario(&self) -> Option<&Scenario> {
        self.current.and_then(|index| self.catalog.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Vec2;

    fn catalog() -> ScenarioCatalog {
        ScenarioCatalog::new(vec![
            Scenario::new(
                "three",
                vec![
                    AgentConfig::new(0.0, 0.0, 0.0),
                    AgentConfig::new(1.0, 0.0, 180.0),
                    AgentConfig::new(0.5, 1.0, 270.0),
                ],
            ),
            Scenario::new(
                "three-b",
                vec![
                    AgentConfig::new(0.0, 1.0, 0.0),
                    AgentConfig::new(2.0, 0.0, 180.0),
                    AgentConfig::new(1.5, 1.0, 270.0),
                ],
            ),
        ])
    }

    fn snapshot(x: f64) -> ShipSnapshot {
        ShipSnapshot {
            position: Vec2::new(x, 0.0),
            velocity: Vec2::ZERO,
            heading: 0.0,
        }
    }

    #[test]
    fn test_empty_catalog_is_fatal() {
        let result = ScenarioManager::new(ScenarioCatalog::default(), 2, Some(1));
        assert_eq!(result.err(), Some(ScenarioError::EmptyCatalog));
    }

    #[test]
    fn test_dispense_once_per_scenario() {
        let mut manager = ScenarioManager::new(catalog(), 4, Some(7)).unwrap();
        assert_eq!(manager.dispense_config(0), None);

        let index = manager.select_scenario().unwrap();
        let expected = catalog().scenarios[index].clone();
        for (id, config) in expected.agents.iter().enumerate() {
            assert_eq!(manager.dispense_config(id).as_ref(), Some(config));
            assert_eq!(manager.dispense_config(id), None);
        }

        // Slot 3 has no configuration in a three-agent scenario.
        assert!(!manager.is_active(3));
        assert_eq!(manager.dispense_config(3), None);
        assert_eq!(manager.dispense_config(99), None);

        manager.select_scenario().unwrap();
        assert!(manager.dispense_config(0).is_some());
    }

    #[test]
    fn test_barrier_rotates_on_last_report_only() {
        let mut manager = ScenarioManager::new(catalog(), 3, Some(3)).unwrap();
        manager.select_scenario().unwrap();
        let generation = manager.generation();
        for id in 0..3 {
            manager.dispense_config(id);
        }

        assert_eq!(
            manager.report_agent_ended(0).unwrap(),
            BarrierOutcome::Waiting { remaining: 2 }
        );
        assert_eq!(
            manager.report_agent_ended(1).unwrap(),
            BarrierOutcome::Waiting { remaining: 1 }
        );
        // A duplicate report must not count twice.
        assert_eq!(
            manager.report_agent_ended(1).unwrap(),
            BarrierOutcome::Waiting { remaining: 1 }
        );
        assert_eq!(manager.generation(), generation);

        let outcome = manager.report_agent_ended(2).unwrap();
        assert!(matches!(outcome, BarrierOutcome::Rotated { generation: g, .. } if g == generation + 1));
        assert_eq!(manager.generation(), generation + 1);
        assert_eq!(manager.active_count(), 3);
        assert!((0..3).all(|id| !manager.is_ended(id)));
    }

    #[test]
    fn test_report_from_unknown_agent() {
        let mut manager = ScenarioManager::new(catalog(), 2, Some(3)).unwrap();
        manager.select_scenario().unwrap();
        assert_eq!(
            manager.report_agent_ended(5),
            Err(ScenarioError::UnknownAgent { agent: 5, slots: 2 })
        );
    }

    #[test]
    fn test_each_forced_end_rotates_once() {
        let mut manager = ScenarioManager::new(catalog(), 3, Some(11)).unwrap();
        manager.select_scenario().unwrap();
        manager.dispense_config(0);

        let before = manager.generation();
        manager.end_scenario_for_all().unwrap();
        assert_eq!(manager.generation(), before + 1);
        manager.end_scenario_for_all().unwrap();
        assert_eq!(manager.generation(), before + 2);

        // Every forced end leaves fresh, unstarted slots behind.
        assert_eq!(manager.active_count(), 3);
        assert!(!manager.is_ended(0));
        assert!(manager.dispense_config(0).is_some());
    }

    #[test]
    fn test_snapshots_show_previous_tick_only() {
        let mut manager = ScenarioManager::new(catalog(), 3, Some(5)).unwrap();
        manager.select_scenario().unwrap();
        for id in 0..3 {
            manager.dispense_config(id);
            manager.commit_snapshot(id, 0, snapshot(id as f64));
        }

        // Agent 1 finishes tick 1 before agent 0 reads at tick 1.
        manager.commit_snapshot(1, 1, snapshot(10.0));
        let seen = manager.snapshot_other_agents(0, 1);
        assert_eq!(seen.len(), 2);
        assert_eq!(seen.iter().find(|(id, _)| *id == 1).unwrap().1, snapshot(1.0));

        // At tick 2 the tick-1 commit is the previous state.
        let seen = manager.snapshot_other_agents(0, 2);
        assert_eq!(seen.iter().find(|(id, _)| *id == 1).unwrap().1, snapshot(10.0));
        assert!(seen.iter().all(|(id, _)| *id != 0));
    }

    #[test]
    fn test_ended_agents_leave_the_snapshot() {
        let mut manager = ScenarioManager::new(catalog(), 3, Some(5)).unwrap();
        manager.select_scenario().unwrap();
        for id in 0..3 {
            manager.dispense_config(id);
            manager.commit_snapshot(id, 0, snapshot(id as f64));
        }
        manager.report_agent_ended(2).unwrap();
        let seen = manager.snapshot_other_agents(0, 1);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 1);
    }

    #[test]
    fn test_seeded_selection_is_reproducible() {
        let mut a = ScenarioManager::new(catalog(), 3, Some(42)).unwrap();
        let mut b = ScenarioManager::new(catalog(), 3, Some(42)).unwrap();
        for _ in 0..10 {
            assert_eq!(a.select_scenario().unwrap(), b.select_scenario().unwrap());
        }
    }
}
