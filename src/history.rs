// ABOUTME: Run history persistence: one JSON record per orchestration run.
// ABOUTME: What actually happened, auditable independently of any narrative.

use crate::run::DeploymentReport;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unreadable run record {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize run record: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Append-only store of deployment reports under `<state_dir>/runs`,
/// keyed by run start timestamp.
pub struct RunHistory {
    dir: PathBuf,
}

impl RunHistory {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("runs"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one finished run. Returns the record path.
    pub fn record(&self, report: &DeploymentReport) -> Result<PathBuf, HistoryError> {
        std::fs::create_dir_all(&self.dir)?;

        let filename = format!("{}.json", report.started_at.format("%Y%m%dT%H%M%S%.3fZ"));
        let path = self.dir.join(filename);

        let json = serde_json::to_string_pretty(report).map_err(HistoryError::Serialize)?;
        std::fs::write(&path, json)?;

        tracing::debug!("Recorded run at {}", path.display());
        Ok(path)
    }

    /// Load past runs, most recent first. Unreadable records are an error:
    /// an audit trail with silently missing entries is not an audit trail.
    pub fn load(&self, limit: usize) -> Result<Vec<DeploymentReport>, HistoryError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        // Timestamped filenames sort chronologically.
        paths.sort();
        paths.reverse();

        paths
            .into_iter()
            .take(limit)
            .map(|path| {
                let content = std::fs::read_to_string(&path)?;
                serde_json::from_str(&content)
                    .map_err(|source| HistoryError::Corrupt { path, source })
            })
            .collect()
    }
}
