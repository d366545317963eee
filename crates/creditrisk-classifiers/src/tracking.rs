//! Experiment tracking.
//!
//! The grid search reports the winning parameters, training metrics and the
//! fitted model through an [`ExperimentTracker`]. [`LocalTracker`] keeps an
//! mlflow-style directory per run:
//!
//! ```text
//! <root>/<run_id>/meta.json
//! <root>/<run_id>/params/<name>        value
//! <root>/<run_id>/metrics/<name>       "<unix_ms> <value> 0" per logged value
//! <root>/<run_id>/artifacts/<name>
//! ```
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub trait ExperimentTracker: Send + Sync {
    fn log_param(&self, key: &str, value: &str) -> Result<()>;
    fn log_metric(&self, key: &str, value: f64) -> Result<()>;
    fn log_artifact(&self, name: &str, bytes: &[u8]) -> Result<()>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl ExperimentTracker for NoopTracker {
    fn log_param(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    fn log_metric(&self, _key: &str, _value: f64) -> Result<()> {
        Ok(())
    }

    fn log_artifact(&self, _name: &str, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub experiment_name: String,
    pub status: RunStatus,
    pub start_time: i64,
    pub end_time: Option<i64>,
}

/// File-system tracker writing one directory per run.
#[derive(Debug, Clone)]
pub struct LocalTracker {
    run_dir: PathBuf,
    meta: RunMeta,
}

impl LocalTracker {
    /// Create a new run directory under `root`.
    pub fn start<P: AsRef<Path>>(root: P, experiment_name: &str) -> Result<Self> {
        let started: DateTime<Utc> = Utc::now();
        let run_id = format!("{}-{:08x}", started.format("%Y%m%dT%H%M%S%3f"), rand::random::<u32>());
        let run_dir = root.as_ref().join(&run_id);

        for sub in ["params", "metrics", "artifacts"] {
            fs::create_dir_all(run_dir.join(sub))
                .with_context(|| format!("Failed to create tracking directory: {}", run_dir.join(sub).display()))?;
        }

        let tracker = LocalTracker {
            run_dir,
            meta: RunMeta {
                run_id,
                experiment_name: experiment_name.to_string(),
                status: RunStatus::Running,
                start_time: started.timestamp_millis(),
                end_time: None,
            },
        };
        tracker.write_meta()?;
        log::debug!("Tracking run {} in {}", tracker.meta.run_id, tracker.run_dir.display());
        Ok(tracker)
    }

    pub fn run_id(&self) -> &str {
        &self.meta.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Close the run with the given status.
    pub fn finish(mut self, status: RunStatus) -> Result<RunMeta> {
        self.meta.status = status;
        self.meta.end_time = Some(Utc::now().timestamp_millis());
        self.write_meta()?;
        Ok(self.meta)
    }

    fn write_meta(&self) -> Result<()> {
        let path = self.run_dir.join("meta.json");
        let json = serde_json::to_string_pretty(&self.meta)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn entry_path(&self, kind: &str, name: &str) -> PathBuf {
        let file_name: String = name
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.run_dir.join(kind).join(file_name)
    }
}

impl ExperimentTracker for LocalTracker {
    fn log_param(&self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path("params", key);
        fs::write(&path, value).with_context(|| format!("Failed to log param to {}", path.display()))
    }

    fn log_metric(&self, key: &str, value: f64) -> Result<()> {
        let path = self.entry_path("metrics", key);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open metric file {}", path.display()))?;
        writeln!(file, "{} {} 0", Utc::now().timestamp_millis(), value)?;
        Ok(())
    }

    fn log_artifact(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.entry_path("artifacts", name);
        fs::write(&path, bytes).with_context(|| format!("Failed to write artifact {}", path.display()))
    }
}
