//! Run configuration from `SHIPSIM_*` environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::env::{ControllerConfig, RunnerConfig};
use crate::reward::RewardConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub host: String,
    pub base_port: u16,
    pub agents: usize,
    pub episodes: u64,
    pub seed: Option<u64>,
    /// JSON scenario catalog, the built-in one when unset
    pub scenarios: Option<PathBuf>,
    pub episode_log_dir: Option<PathBuf>,
    pub response_timeout: Duration,
    pub max_ticks: u64,
    pub controller: ControllerConfig,
    pub reward: RewardConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            base_port: 5050,
            agents: 3,
            episodes: RunnerConfig::default().episodes,
            seed: None,
            scenarios: None,
            episode_log_dir: None,
            response_timeout: Duration::from_secs(5),
            max_ticks: RunnerConfig::default().max_ticks,
            controller: ControllerConfig::default(),
            reward: RewardConfig::default(),
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(None),
    }
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unset keys keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("SHIPSIM_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "SHIPSIM_BASE_PORT")? {
            config.base_port = port;
        }
        if let Some(agents) = parse_var::<usize>(&lookup, "SHIPSIM_AGENTS")? {
            if agents == 0 {
                return Err(ConfigError::Invalid {
                    key: "SHIPSIM_AGENTS",
                    value: agents.to_string(),
                });
            }
            config.agents = agents;
        }
        if let Some(episodes) = parse_var(&lookup, "SHIPSIM_EPISODES")? {
            config.episodes = episodes;
        }
        config.seed = parse_var(&lookup, "SHIPSIM_SEED")?;
        config.scenarios = lookup("SHIPSIM_SCENARIOS").map(PathBuf::from);
        config.episode_log_dir = lookup("SHIPSIM_EPISODE_LOG_DIR").map(PathBuf::from);
        if let Some(speed) = parse_var(&lookup, "SHIPSIM_BASE_SPEED")? {
            config.controller.base_speed = speed;
        }
        if let Some(ms) = parse_var(&lookup, "SHIPSIM_RESPONSE_TIMEOUT_MS")? {
            config.response_timeout = Duration::from_millis(ms);
        }
        if let Some(ticks) = parse_var(&lookup, "SHIPSIM_MAX_TICKS")? {
            config.max_ticks = ticks;
        }

        Ok(config)
    }

    pub fn runner(&self) -> RunnerConfig {
        RunnerConfig {
            episodes: self.episodes,
            max_ticks: self.max_ticks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EnvConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.base_port, 5050);
        assert_eq!(config.agents, 3);
        assert_eq!(config.response_timeout, Duration::from_secs(5));
        assert_eq!(config.controller.base_speed, 50.0);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = EnvConfig::from_lookup(lookup(&[
            ("SHIPSIM_HOST", "sim.local"),
            ("SHIPSIM_BASE_PORT", "6000"),
            ("SHIPSIM_AGENTS", "2"),
            ("SHIPSIM_EPISODES", "25"),
            ("SHIPSIM_SEED", "42"),
            ("SHIPSIM_SCENARIOS", "scenarios.json"),
            ("SHIPSIM_BASE_SPEED", "35.5"),
            ("SHIPSIM_RESPONSE_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.host, "sim.local");
        assert_eq!(config.base_port, 6000);
        assert_eq!(config.agents, 2);
        assert_eq!(config.runner().episodes, 25);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.scenarios, Some(PathBuf::from("scenarios.json")));
        assert_eq!(config.controller.base_speed, 35.5);
        assert_eq!(config.response_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = EnvConfig::from_lookup(lookup(&[("SHIPSIM_BASE_PORT", "70000")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "SHIPSIM_BASE_PORT",
                value: "70000".to_string()
            }
        );
        assert!(EnvConfig::from_lookup(lookup(&[("SHIPSIM_AGENTS", "0")])).is_err());
    }
}
