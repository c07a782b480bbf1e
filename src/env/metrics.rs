//! Episode statistics for a run

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use crate::reward::Termination;

#[derive(Debug, Clone, Default)]
pub struct ScenarioStats {
    pub episodes: usize,
    pub goals: usize,
    pub collisions: usize,
    pub total_reward: f64,
}

/// Aggregated outcome of every finished episode.
#[derive(Debug)]
pub struct RunMetrics {
    pub episodes: usize,
    pub total_steps: u64,
    /// Reward and length of the last `window` episodes, oldest first
    recent: VecDeque<(f64, u64)>,
    window: usize,
    pub terminations: HashMap<&'static str, usize>,
    pub scenario_stats: HashMap<String, ScenarioStats>,
    start_time: Instant,
}

impl RunMetrics {
    pub fn new(window_size: usize) -> Self {
        Self {
            episodes: 0,
            total_steps: 0,
            recent: VecDeque::with_capacity(window_size),
            window: window_size.max(1),
            terminations: HashMap::new(),
            scenario_stats: HashMap::new(),
            start_time: Instant::now(),
        }
    }

    /// Record one agent's episode. `None` means it was cut short.
    pub fn record_episode(
        &mut self,
        scenario: &str,
        reward: f64,
        steps: u64,
        termination: Option<Termination>,
    ) {
        self.episodes += 1;
        self.total_steps += steps;
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back((reward, steps));

        let key = termination.map_or("interrupted", Termination::as_str);
        *self.terminations.entry(key).or_default() += 1;

        let stats = self.scenario_stats.entry(scenario.to_string()).or_default();
        stats.episodes += 1;
        stats.total_reward += reward;
        match termination {
            Some(Termination::GoalReached) => stats.goals += 1,
            Some(Termination::Collision) => stats.collisions += 1,
            _ => {}
        }
    }

    /// Mean reward over the recent window.
    pub fn recent_reward(&self) -> f64 {
        self.recent_mean(|(reward, _)| reward)
    }

    /// Mean episode length over the recent window.
    pub fn recent_length(&self) -> f64 {
        self.recent_mean(|(_, steps)| steps as f64)
    }

    fn recent_mean(&self, value: impl Fn((f64, u64)) -> f64) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        self.recent.iter().copied().map(value).sum::<f64>() / self.recent.len() as f64
    }

    pub fn count(&self, termination: Option<Termination>) -> usize {
        let key = termination.map_or("interrupted", Termination::as_str);
        self.terminations.get(key).copied().unwrap_or(0)
    }

    pub fn collision_rate(&self) -> f64 {
        if self.episodes > 0 {
            self.count(Some(Termination::Collision)) as f64 / self.episodes as f64
        } else {
            0.0
        }
    }

    pub fn goal_rate(&self) -> f64 {
        if self.episodes > 0 {
            self.count(Some(Termination::GoalReached)) as f64 / self.episodes as f64
        } else {
            0.0
        }
    }

    pub fn steps_per_second(&self) -> f64 {
        let duration = self.start_time.elapsed().as_secs_f64();
        if duration > 0.0 {
            self.total_steps as f64 / duration
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        tracing::info!("=== Run Summary ===");
        tracing::info!("Episodes: {}", self.episodes);
        tracing::info!("Steps: {} ({:.1}/s)", self.total_steps, self.steps_per_second());
        tracing::info!(
            "Recent: reward={:.3}, length={:.1}",
            self.recent_reward(),
            self.recent_length()
        );
        tracing::info!("Goal Rate: {:.1}%", self.goal_rate() * 100.0);
        tracing::info!("Collision Rate: {:.1}%", self.collision_rate() * 100.0);

        let mut terminations: Vec<_> = self.terminations.iter().collect();
        terminations.sort();
        for (termination, count) in terminations {
            tracing::info!("  {}: {}", termination, count);
        }

        let mut scenarios: Vec<_> = self.scenario_stats.iter().collect();
        scenarios.sort_by(|a, b| a.0.cmp(b.0));
        for (name, stats) in scenarios {
            tracing::info!(
                "  {}: {} episodes, {} goals, {} collisions, avg reward {:.3}",
                name,
                stats.episodes,
                stats.goals,
                stats.collisions,
                stats.total_reward / stats.episodes.max(1) as f64
            );
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_window_drops_oldest() {
        let mut metrics = RunMetrics::new(2);
        assert_eq!(metrics.recent_reward(), 0.0);
        metrics.record_episode("solo", 1.0, 10, None);
        metrics.record_episode("solo", 3.0, 20, None);
        metrics.record_episode("solo", 5.0, 40, None);
        assert!((metrics.recent_reward() - 4.0).abs() < 1e-12);
        assert!((metrics.recent_length() - 30.0).abs() < 1e-12);
        assert_eq!(metrics.episodes, 3);
    }

    #[test]
    fn test_run_metrics_counts() {
        let mut metrics = RunMetrics::new(10);
        metrics.record_episode("head-on", 1.0, 100, Some(Termination::GoalReached));
        metrics.record_episode("head-on", -1.0, 20, Some(Termination::Collision));
        metrics.record_episode("crossing", 0.0, 5, None);

        assert_eq!(metrics.episodes, 3);
        assert_eq!(metrics.total_steps, 125);
        assert_eq!(metrics.count(None), 1);
        assert!((metrics.goal_rate() - 1.0 / 3.0).abs() < 1e-12);
        let stats = &metrics.scenario_stats["head-on"];
        assert_eq!((stats.episodes, stats.goals, stats.collisions), (2, 1, 1));
    }
}
