// ABOUTME: Shared test doubles for integration tests.
// ABOUTME: In-memory runtime, cloud provisioner, and secret store collaborators.

use async_trait::async_trait;
use convoy::manifest::{Manifest, ProbeTarget, ResourceSpec, StartDirective};
use convoy::provision::{CloudError, CloudProvisioner, ResourceRecord, SecretError, SecretStore};
use convoy::runtime::{ProbeOutcome, Runtime, RuntimeError, StartOutcome};
use convoy::types::UnitName;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

pub fn manifest(yaml: &str) -> Manifest {
    Manifest::from_yaml(yaml).expect("test manifest should parse")
}

/// Runtime double: records every start call with its injected environment,
/// and answers probes from a per-unit "healthy after N attempts" script.
#[derive(Default)]
pub struct MockRuntime {
    starts: Mutex<Vec<(String, HashMap<String, String>)>>,
    rejected: Mutex<HashSet<String>>,
    pass_after: Mutex<HashMap<String, u32>>,
    attempts: Mutex<HashMap<String, u32>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe for `unit` passes on attempt `n` and later. Units without a
    /// script pass on the first attempt.
    pub fn healthy_after(&self, unit: &str, n: u32) {
        self.pass_after.lock().insert(unit.to_string(), n);
    }

    pub fn never_healthy(&self, unit: &str) {
        self.healthy_after(unit, u32::MAX);
    }

    pub fn reject_start(&self, unit: &str) {
        self.rejected.lock().insert(unit.to_string());
    }

    pub fn started_units(&self) -> Vec<String> {
        self.starts.lock().iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn start_env(&self, unit: &str) -> Option<HashMap<String, String>> {
        self.starts
            .lock()
            .iter()
            .find(|(u, _)| u == unit)
            .map(|(_, env)| env.clone())
    }

    pub fn probe_attempts(&self, unit: &str) -> u32 {
        self.attempts.lock().get(unit).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Runtime for MockRuntime {
    async fn start(
        &self,
        unit: &UnitName,
        _directive: &StartDirective,
        env: &HashMap<String, String>,
    ) -> Result<StartOutcome, RuntimeError> {
        self.starts.lock().push((unit.to_string(), env.clone()));
        if self.rejected.lock().contains(unit.as_str()) {
            return Ok(StartOutcome::Rejected("image not found".to_string()));
        }
        Ok(StartOutcome::Accepted)
    }

    async fn probe(&self, unit: &UnitName, _target: &ProbeTarget) -> ProbeOutcome {
        let attempt = {
            let mut attempts = self.attempts.lock();
            let n = attempts.entry(unit.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        let threshold = self
            .pass_after
            .lock()
            .get(unit.as_str())
            .copied()
            .unwrap_or(1);
        if attempt >= threshold {
            ProbeOutcome::Pass
        } else {
            ProbeOutcome::Fail("not ready yet".to_string())
        }
    }
}

/// Cloud double with create-or-existing semantics: the first ensure for a
/// resource name "creates" it, later ensures report it as existing with the
/// same outputs.
#[derive(Default)]
pub struct MockCloud {
    calls: Mutex<Vec<String>>,
    created: Mutex<HashSet<String>>,
    outputs: Mutex<HashMap<String, HashMap<String, String>>>,
    failing: Mutex<HashSet<String>>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outputs(self, resource: &str, pairs: &[(&str, &str)]) -> Self {
        self.outputs.lock().insert(
            resource.to_string(),
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn fail_resource(&self, resource: &str) {
        self.failing.lock().insert(resource.to_string());
    }

    pub fn ensure_calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn creation_count(&self, resource: &str) -> usize {
        // One creation happens per resource at most; verify it stayed that way.
        usize::from(self.created.lock().contains(resource))
    }
}

#[async_trait]
impl CloudProvisioner for MockCloud {
    async fn ensure_resource(&self, spec: &ResourceSpec) -> Result<ResourceRecord, CloudError> {
        self.calls.lock().push(spec.name.clone());

        if self.failing.lock().contains(&spec.name) {
            return Err(CloudError::CommandFailed {
                resource: spec.name.clone(),
                detail: "quota exceeded".to_string(),
            });
        }

        let existing = !self.created.lock().insert(spec.name.clone());
        let outputs = self
            .outputs
            .lock()
            .get(&spec.name)
            .cloned()
            .unwrap_or_default();

        Ok(ResourceRecord { existing, outputs })
    }
}

/// In-memory secret store with first-write-wins put.
#[derive(Default)]
pub struct MemorySecretStore {
    map: Mutex<HashMap<String, String>>,
    puts: Mutex<Vec<String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_names(&self) -> Vec<String> {
        self.puts.lock().clone()
    }

    pub fn stored(&self, name: &str) -> Option<String> {
        self.map.lock().get(name).cloned()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn put(&self, name: &str, value: &str) -> Result<(), SecretError> {
        self.puts.lock().push(name.to_string());
        self.map
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        Ok(self.map.lock().get(name).cloned())
    }
}
