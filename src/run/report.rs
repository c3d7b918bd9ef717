// ABOUTME: Aggregates per-unit terminal states into one deployment report.
// ABOUTME: The verdict drives the process exit code; no prose percentages.

use super::state::{StateTable, UnitState};
use crate::manifest::{UnitKind, UnitSpec};
use crate::types::UnitName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level outcome of one orchestration run. "Looks done" and "is done"
/// are the same thing here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every unit reached Healthy.
    Success,
    /// Every required unit Healthy; some optional services did not make it.
    PartialSuccess,
    /// A required unit never reached Healthy, or the run deadline fired.
    Failure,
}

impl Verdict {
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Success => 0,
            Verdict::PartialSuccess => 1,
            Verdict::Failure => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitReport {
    pub name: UnitName,
    pub kind: UnitKind,
    pub required: bool,
    pub state: UnitState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
}

/// Immutable snapshot of what one run actually did. Written to run history
/// so "what happened" outlives any narrative about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub verdict: Verdict,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_failure: Option<String>,
    pub units: Vec<UnitReport>,
}

impl DeploymentReport {
    /// Count of units per state, for rendering.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for unit in &self.units {
            *counts.entry(unit.state.to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn failed_units(&self) -> impl Iterator<Item = &UnitReport> {
        self.units
            .iter()
            .filter(|u| u.state == UnitState::Failed)
    }
}

/// Roll the state table up into a report. `units` must be in declaration
/// order so reports are reproducible.
pub fn summarize(
    units: &[&UnitSpec],
    table: &StateTable,
    started_at: DateTime<Utc>,
    elapsed_secs: f64,
    timed_out: bool,
) -> DeploymentReport {
    let unit_reports: Vec<UnitReport> = units
        .iter()
        .map(|unit| {
            let record = table.record(&unit.name);
            UnitReport {
                name: unit.name.clone(),
                kind: unit.kind,
                required: unit.is_required(),
                state: record.as_ref().map_or(UnitState::Pending, |r| r.state),
                first_error: record.and_then(|r| r.first_error),
            }
        })
        .collect();

    let any_required_unhealthy = unit_reports
        .iter()
        .any(|u| u.required && u.state != UnitState::Healthy);
    let all_healthy = unit_reports
        .iter()
        .all(|u| u.state == UnitState::Healthy);

    let verdict = if timed_out || any_required_unhealthy {
        Verdict::Failure
    } else if all_healthy {
        Verdict::Success
    } else {
        Verdict::PartialSuccess
    };

    DeploymentReport {
        started_at,
        elapsed_secs,
        verdict,
        timed_out,
        first_failure: table.first_failure(),
        units: unit_reports,
    }
}
