use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use time::{OffsetDateTime, format_description};

use crate::reward::Termination;
use crate::scenario::AgentId;

/// One finished episode as written to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRecord {
    pub generation: u64,
    pub scenario: String,
    pub agent: AgentId,
    pub steps: u64,
    pub total_reward: f64,
    pub termination: Option<Termination>,
}

/// CSV log of finished episodes, one file per run.
pub struct EpisodeLog {
    path: PathBuf,
    file: File,
}

impl EpisodeLog {
    pub fn create(folder: impl AsRef<Path>, run_name: &str) -> io::Result<Self> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let format = format_description::parse("[year][month][day]-[hour][minute][second]")
            .map_err(io::Error::other)?;
        let date_time_str = now.format(&format).map_err(io::Error::other)?;

        let path = folder
            .as_ref()
            .join(format!("{} - {}.csv", run_name, date_time_str));
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&path)?;
        writeln!(file, "generation,scenario,agent,steps,total_reward,termination")?;
        file.flush()?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &EpisodeRecord) -> io::Result<()> {
        writeln!(
            self.file,
            "{},{},{},{},{:.6},{}",
            record.generation,
            record.scenario,
            record.agent,
            record.steps,
            record.total_reward,
            record.termination.map_or("interrupted", Termination::as_str)
        )?;
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_log_writes_rows() {
        let folder = std::env::temp_dir().join(format!("shipsim-log-{}", std::process::id()));
        let mut log = EpisodeLog::create(&folder, "unit").unwrap();
        log.append(&EpisodeRecord {
            generation: 3,
            scenario: "head-on".to_string(),
            agent: 1,
            steps: 42,
            total_reward: -0.5,
            termination: Some(Termination::Collision),
        })
        .unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "3,head-on,1,42,-0.500000,collision");

        fs::remove_dir_all(&folder).ok();
    }
}
