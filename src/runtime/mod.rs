// ABOUTME: Runtime collaborator trait: accept start directives, answer probe requests.
// ABOUTME: The orchestrator never interprets directives itself.

mod process;

pub use process::ProcessRuntime;

use crate::manifest::{ProbeTarget, StartDirective};
use crate::types::UnitName;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime rejected start directive: {0}")]
    StartRejected(String),

    #[error("invalid probe target: {0}")]
    InvalidProbe(String),

    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether the runtime accepted a start directive. Acceptance means the
/// directive began executing, not that the unit is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Accepted,
    Rejected(String),
}

/// Result of one probe attempt. Transport failures count as failed attempts,
/// not as orchestrator errors: a connection refused just means "not yet".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Pass,
    Fail(String),
}

impl ProbeOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ProbeOutcome::Pass)
    }
}

/// Container-engine-shaped collaborator: start things, check readiness.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Execute a unit's start directive with the resolved configuration
    /// injected as environment. Returns once the directive is accepted or
    /// rejected; never waits for readiness.
    async fn start(
        &self,
        unit: &UnitName,
        directive: &StartDirective,
        env: &HashMap<String, String>,
    ) -> Result<StartOutcome, RuntimeError>;

    /// Perform one readiness check against the given target.
    async fn probe(&self, unit: &UnitName, target: &ProbeTarget) -> ProbeOutcome;
}
