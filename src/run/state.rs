// ABOUTME: Per-unit lifecycle states and the shared run state table.
// ABOUTME: Single writer per key; first failure cause is recorded once.

use crate::types::UnitName;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle of one unit within a run.
///
/// `Pending → Provisioning (infra only) → Starting → Probing → Healthy`,
/// with `Probing → Unhealthy → Failed` on the failure path. `Healthy` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Pending,
    Provisioning,
    Starting,
    Probing,
    Healthy,
    Unhealthy,
    Failed,
}

impl UnitState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Healthy | UnitState::Failed)
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitState::Pending => "pending",
            UnitState::Provisioning => "provisioning",
            UnitState::Starting => "starting",
            UnitState::Probing => "probing",
            UnitState::Healthy => "healthy",
            UnitState::Unhealthy => "unhealthy",
            UnitState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct UnitRecord {
    pub state: UnitState,
    pub first_error: Option<String>,
}

/// The only mutable state shared across unit worker tasks. Each task writes
/// its own unit's entry; terminal states are never overwritten.
pub struct StateTable {
    inner: Mutex<HashMap<UnitName, UnitRecord>>,
    first_failure: Mutex<Option<String>>,
}

impl StateTable {
    pub fn new<'a>(names: impl IntoIterator<Item = &'a UnitName>) -> Self {
        let inner = names
            .into_iter()
            .map(|name| {
                (
                    name.clone(),
                    UnitRecord {
                        state: UnitState::Pending,
                        first_error: None,
                    },
                )
            })
            .collect();
        Self {
            inner: Mutex::new(inner),
            first_failure: Mutex::new(None),
        }
    }

    /// Advance a unit's state. Writes to a terminal state are ignored so a
    /// late transition can never resurrect a failed or healthy unit.
    pub fn set(&self, name: &UnitName, state: UnitState) {
        let mut inner = self.inner.lock();
        if let Some(record) = inner.get_mut(name) {
            if record.state.is_terminal() {
                tracing::debug!(
                    "Ignoring transition of {} from terminal {} to {}",
                    name,
                    record.state,
                    state
                );
                return;
            }
            tracing::debug!("{}: {} -> {}", name, record.state, state);
            record.state = state;
        }
    }

    /// Mark a unit failed with its first-failure cause. The cause is written
    /// once; later failures of the same unit do not overwrite it.
    pub fn fail(&self, name: &UnitName, cause: &str) {
        let mut inner = self.inner.lock();
        if let Some(record) = inner.get_mut(name) {
            if record.state == UnitState::Failed {
                return;
            }
            tracing::warn!("{} failed: {}", name, cause);
            record.state = UnitState::Failed;
            if record.first_error.is_none() {
                record.first_error = Some(cause.to_string());
            }
        }
        drop(inner);

        let mut first = self.first_failure.lock();
        if first.is_none() {
            *first = Some(format!("{name}: {cause}"));
        }
    }

    pub fn state(&self, name: &UnitName) -> Option<UnitState> {
        self.inner.lock().get(name).map(|r| r.state)
    }

    pub fn record(&self, name: &UnitName) -> Option<UnitRecord> {
        self.inner.lock().get(name).cloned()
    }

    pub fn is_healthy(&self, name: &UnitName) -> bool {
        self.state(name) == Some(UnitState::Healthy)
    }

    /// First failure across the whole run, as `unit: cause`.
    pub fn first_failure(&self) -> Option<String> {
        self.first_failure.lock().clone()
    }
}
