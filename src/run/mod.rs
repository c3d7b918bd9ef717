// ABOUTME: Run-time orchestration: state tracking, launching, verification, reporting.
// ABOUTME: Exports the Orchestrator driver and the report types it produces.

mod launcher;
mod report;
mod runner;
mod state;
mod verifier;

pub use launcher::StartError;
pub use report::{DeploymentReport, UnitReport, Verdict, summarize};
pub use runner::{Orchestrator, Plan, RunOptions, env_overrides_for};
pub use state::{StateTable, UnitRecord, UnitState};
pub use verifier::VerifyError;
