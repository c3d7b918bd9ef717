// ABOUTME: Launches units by handing their start directive to the runtime.
// ABOUTME: Confirms acceptance only; readiness is the verifier's job.

use crate::assemble::ResolvedConfig;
use crate::manifest::UnitSpec;
use crate::runtime::{Runtime, StartOutcome};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("start directive rejected: {0}")]
    Rejected(String),

    #[error("runtime failure during start: {0}")]
    Runtime(String),
}

/// Invoke one unit's start directive with its resolved configuration
/// injected. Called concurrently for independent units of a batch. A
/// rejection (image missing, binary not found) fails the unit immediately
/// with no probing attempted.
pub async fn start_unit(
    runtime: &dyn Runtime,
    unit: &UnitSpec,
    config: &ResolvedConfig,
) -> Result<(), StartError> {
    tracing::info!("Starting {}", unit.name);

    let outcome = runtime
        .start(&unit.name, &unit.start, &config.as_env())
        .await
        .map_err(|e| StartError::Runtime(e.to_string()))?;

    match outcome {
        StartOutcome::Accepted => Ok(()),
        StartOutcome::Rejected(reason) => Err(StartError::Rejected(reason)),
    }
}
