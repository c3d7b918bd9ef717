// ABOUTME: Readiness verification: polls each unit's probe until healthy or budget exhausted.
// ABOUTME: Drives the Probing/Healthy/Unhealthy transitions in the state table.

use super::state::{StateTable, UnitState};
use crate::manifest::UnitSpec;
use crate::runtime::{ProbeOutcome, Runtime};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("probe never succeeded within {attempts} attempts: {last_failure}")]
    ProbeTimeout { attempts: u32, last_failure: String },
}

/// Poll one unit's readiness probe until it passes or the attempt budget is
/// exhausted. On exhaustion the unit goes `Unhealthy`, gets one escalation
/// window (a final interval plus one more probe), and then `Failed` is left
/// to the caller via the returned error.
pub async fn await_healthy(
    runtime: &dyn Runtime,
    unit: &UnitSpec,
    table: &StateTable,
) -> Result<(), VerifyError> {
    let probe = &unit.probe;
    table.set(&unit.name, UnitState::Probing);

    let mut last_failure = String::from("no attempts made");

    for attempt in 1..=probe.attempts {
        match attempt_once(runtime, unit, probe.timeout).await {
            ProbeOutcome::Pass => {
                tracing::info!("{} healthy after {} attempt(s)", unit.name, attempt);
                table.set(&unit.name, UnitState::Healthy);
                return Ok(());
            }
            ProbeOutcome::Fail(reason) => {
                last_failure = reason;
            }
        }

        if attempt < probe.attempts {
            tokio::time::sleep(probe.interval).await;
        }
    }

    table.set(&unit.name, UnitState::Unhealthy);
    tracing::warn!(
        "{} unhealthy after {} attempts, escalation window open",
        unit.name,
        probe.attempts
    );

    // One escalation window: a last interval for the unit to come up on its
    // own (or an operator to intervene), then a final probe.
    tokio::time::sleep(probe.interval).await;
    if attempt_once(runtime, unit, probe.timeout).await.passed() {
        table.set(&unit.name, UnitState::Healthy);
        return Ok(());
    }

    Err(VerifyError::ProbeTimeout {
        attempts: probe.attempts,
        last_failure,
    })
}

/// One probe attempt bounded by the per-attempt timeout. Overruns count as
/// failures, never as hangs.
async fn attempt_once(runtime: &dyn Runtime, unit: &UnitSpec, timeout: Duration) -> ProbeOutcome {
    match tokio::time::timeout(timeout, runtime.probe(&unit.name, &unit.probe.target)).await {
        Ok(outcome) => outcome,
        Err(_) => ProbeOutcome::Fail(format!(
            "attempt exceeded {} timeout",
            humantime::format_duration(timeout)
        )),
    }
}
