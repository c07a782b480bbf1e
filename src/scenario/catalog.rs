use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infra::{Vec2, nm};

/// Spawn pose of one agent, in nautical miles and degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    /// Goal position in nautical miles. Defaults to a point dead ahead of the
    /// spawn pose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<[f64; 2]>,
}

impl AgentConfig {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self {
            x,
            y,
            yaw,
            goal: None,
        }
    }

    pub fn with_goal(mut self, x: f64, y: f64) -> Self {
        self.goal = Some([x, y]);
        self
    }

    /// Goal position in working units.
    pub fn goal_position(&self, default_distance_nm: f64) -> Vec2 {
        match self.goal {
            Some([x, y]) => Vec2::new(nm(x), nm(y)),
            None => {
                let start = Vec2::new(nm(self.x), nm(self.y));
                start + Vec2::from_heading(self.yaw.to_radians()) * nm(default_distance_nm)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    pub agents: Vec<AgentConfig>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, agents: Vec<AgentConfig>) -> Self {
        Self {
            name: name.into(),
            agents,
        }
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read scenario catalog {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed scenario catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The set of scenarios episodes are drawn from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioCatalog {
    pub scenarios: Vec<Scenario>,
}

impl ScenarioCatalog {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Classic two- and three-ship encounters.
    pub fn builtin() -> Self {
        Self::new(vec![
            Scenario::new(
                "head-on",
                vec![
                    AgentConfig::new(0.0, 0.0, 0.0).with_goal(5.0, 0.0),
                    AgentConfig::new(5.0, 0.0, 180.0).with_goal(0.0, 0.0),
                ],
            ),
            Scenario::new(
                "crossing",
                vec![
                    AgentConfig::new(0.0, 0.0, 0.0).with_goal(5.0, 0.0),
                    AgentConfig::new(2.5, 2.5, 270.0).with_goal(2.5, -2.5),
                ],
            ),
            Scenario::new(
                "overtaking",
                vec![
                    AgentConfig::new(0.0, 0.0, 0.0).with_goal(6.0, 0.0),
                    AgentConfig::new(1.0, 0.1, 0.0).with_goal(6.0, 0.1),
                ],
            ),
            Scenario::new(
                "three-ship",
                vec![
                    AgentConfig::new(0.0, 0.0, 0.0).with_goal(5.0, 0.0),
                    AgentConfig::new(5.0, 0.0, 180.0).with_goal(0.0, 0.0),
                    AgentConfig::new(2.5, -2.5, 90.0).with_goal(2.5, 2.5),
                ],
            ),
        ])
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Scenario> {
        self.scenarios.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog_json() {
        let json = r#"{
            "scenarios": [
                {"name": "pair", "agents": [
                    {"x": 0.0, "y": 0.0, "yaw": 0.0},
                    {"x": 3.0, "y": 1.0, "yaw": 200.0, "goal": [0.0, 1.0]}
                ]},
                {"agents": [{"x": 1.0, "y": 1.0, "yaw": 45.0}]}
            ]
        }"#;
        let catalog = ScenarioCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.scenarios[0].agent_count(), 2);
        assert_eq!(catalog.scenarios[0].agents[1].goal, Some([0.0, 1.0]));
        assert_eq!(catalog.scenarios[1].name, "");
    }

    #[test]
    fn test_malformed_catalog_is_rejected() {
        let err = ScenarioCatalog::from_json(r#"{"scenarios": [{"agents": [{"x": 1}]}]}"#);
        assert!(matches!(err, Err(CatalogError::Parse(_))));
    }

    #[test]
    fn test_default_goal_is_ahead_of_spawn() {
        let config = AgentConfig::new(1.0, 0.0, 90.0);
        let goal = config.goal_position(5.0);
        assert!((goal.x - nm(1.0)).abs() < 1e-9);
        assert!((goal.y - nm(5.0)).abs() < 1e-9);

        let explicit = config.with_goal(2.0, 3.0).goal_position(5.0);
        assert_eq!(explicit, Vec2::new(nm(2.0), nm(3.0)));
    }

    #[test]
    fn test_builtin_catalog_is_populated() {
        let catalog = ScenarioCatalog::builtin();
        assert!(!catalog.is_empty());
        assert!(catalog.scenarios.iter().all(|s| s.agent_count() >= 2));
    }
}
