// ABOUTME: Dependency graph over deployable units.
// ABOUTME: Layered topological sort producing parallel launch batches.

use crate::manifest::UnitSpec;
use crate::types::UnitName;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unit {unit} depends on unknown unit {dependency}")]
    UnknownDependency { unit: UnitName, dependency: UnitName },

    #[error("dependency cycle among units: {}", format_names(.members))]
    Cycle { members: Vec<UnitName> },
}

fn format_names(names: &[UnitName]) -> String {
    names
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Units whose dependencies are all satisfied by earlier batches.
/// Members may start concurrently; their relative order is declaration order
/// and carries no scheduling meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch(pub Vec<UnitName>);

impl Batch {
    pub fn iter(&self) -> impl Iterator<Item = &UnitName> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Layered topological sort (Kahn's algorithm). A unit enters batch `k` the
/// first round all of its dependencies sit in batches `< k`. Declaration
/// order is preserved within a batch so runs are reproducible.
pub fn build(units: &[&UnitSpec]) -> Result<Vec<Batch>, GraphError> {
    let declared: HashSet<&UnitName> = units.iter().map(|u| &u.name).collect();

    for unit in units {
        for dep in &unit.depends_on {
            if !declared.contains(dep) {
                return Err(GraphError::UnknownDependency {
                    unit: unit.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    let mut placed: HashSet<&UnitName> = HashSet::new();
    let mut remaining: Vec<&UnitSpec> = units.to_vec();
    let mut batches = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|u| u.depends_on.iter().all(|d| placed.contains(d)));

        if ready.is_empty() {
            // Everything left waits on something else that is left: a cycle.
            return Err(GraphError::Cycle {
                members: blocked.iter().map(|u| u.name.clone()).collect(),
            });
        }

        for unit in &ready {
            placed.insert(&unit.name);
        }
        batches.push(Batch(ready.iter().map(|u| u.name.clone()).collect()));
        remaining = blocked;
    }

    Ok(batches)
}
