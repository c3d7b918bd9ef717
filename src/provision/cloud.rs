// ABOUTME: Cloud provisioning collaborator trait and the exec-backed implementation.
// ABOUTME: Resource specs go in, created-or-existing descriptors with outputs come out.

use crate::manifest::{ResourceSpec, StartDirective};
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("provisioner command failed for {resource}: {detail}")]
    CommandFailed { resource: String, detail: String },

    #[error("provisioner produced malformed output line: {0}")]
    MalformedOutput(String),

    #[error("failed to execute provisioner: {0}")]
    Exec(#[from] std::io::Error),
}

/// Descriptor of a created-or-existing cloud resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// True when the resource already existed and was verified, not created.
    pub existing: bool,

    /// Connection outputs (hosts, ports, generated identifiers) plus observed
    /// shape fields (`ENGINE_VERSION`, `TIER`) used for conflict detection.
    pub outputs: HashMap<String, String>,
}

/// The cloud resource provisioning collaborator. Create-or-verify semantics:
/// an already-existing resource is a success, never an error.
#[async_trait]
pub trait CloudProvisioner: Send + Sync {
    async fn ensure_resource(&self, spec: &ResourceSpec) -> Result<ResourceRecord, CloudError>;
}

/// Provisions by invoking an external command, the way the platform's shell
/// tooling wrapped its cloud CLI. The spec is passed as environment variables
/// and the command reports outputs as `KEY=value` lines on stdout. A line
/// `EXISTING=true` marks the resource as pre-existing.
pub struct ExecProvisioner {
    command: StartDirective,
}

impl ExecProvisioner {
    pub fn new(command: StartDirective) -> Self {
        Self { command }
    }

    fn spec_env(spec: &ResourceSpec) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("RESOURCE_KIND".to_string(), spec.kind.clone());
        env.insert("RESOURCE_NAME".to_string(), spec.name.clone());
        if let Some(ref tier) = spec.tier {
            env.insert("RESOURCE_TIER".to_string(), tier.clone());
        }
        if let Some(ref region) = spec.region {
            env.insert("RESOURCE_REGION".to_string(), region.clone());
        }
        if let Some(ref version) = spec.engine_version {
            env.insert("RESOURCE_ENGINE_VERSION".to_string(), version.clone());
        }
        env
    }

    fn parse_outputs(stdout: &str) -> Result<ResourceRecord, CloudError> {
        let mut outputs = HashMap::new();
        let mut existing = false;

        for line in stdout.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| CloudError::MalformedOutput(line.to_string()))?;
            if key == "EXISTING" {
                existing = value.eq_ignore_ascii_case("true");
            } else {
                outputs.insert(key.to_string(), value.to_string());
            }
        }

        Ok(ResourceRecord { existing, outputs })
    }
}

#[async_trait]
impl CloudProvisioner for ExecProvisioner {
    async fn ensure_resource(&self, spec: &ResourceSpec) -> Result<ResourceRecord, CloudError> {
        tracing::info!("Provisioning resource {} ({})", spec.name, spec.kind);

        let output = Command::new(self.command.program())
            .args(self.command.args())
            .envs(Self::spec_env(spec))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CloudError::CommandFailed {
                resource: spec.name.clone(),
                detail: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let record = Self::parse_outputs(&stdout)?;

        if record.existing {
            tracing::debug!("Resource {} already existed, verified", spec.name);
        }

        Ok(record)
    }
}
