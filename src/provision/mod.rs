// ABOUTME: Idempotent infrastructure provisioning ahead of unit launch.
// ABOUTME: Wires the cloud and secret-store collaborators with once-only secret generation.

mod cloud;
mod secrets;

pub use cloud::{CloudError, CloudProvisioner, ExecProvisioner, ResourceRecord};
pub use secrets::{FileSecretStore, SecretError, SecretStore, generate_secret};

use crate::manifest::{ResourceSpec, UnitKind, UnitSpec};
use crate::types::UnitName;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("unit {0} is not an infrastructure unit")]
    NotInfrastructure(UnitName),

    #[error(
        "resource {resource} exists with {field} {observed}, manifest declares {declared}"
    )]
    ShapeConflict {
        resource: String,
        field: &'static str,
        observed: String,
        declared: String,
    },

    #[error("provisioning {unit} failed: {source}")]
    Cloud {
        unit: UnitName,
        #[source]
        source: CloudError,
    },

    #[error("secret store failure for {unit}: {source}")]
    Secrets {
        unit: UnitName,
        #[source]
        source: SecretError,
    },
}

/// Outputs an infrastructure unit exposes to downstream configuration:
/// provisioner connection outputs merged with the unit's secrets.
pub type ProvisionedOutputs = HashMap<String, String>;

/// Ensures external infrastructure exists before its unit is launched.
///
/// Idempotent by construction: the cloud collaborator treats existing
/// resources as success, and secrets are fetched from the store when present
/// rather than regenerated, so re-runs never point dependents at stale
/// credentials.
pub struct Provisioner {
    cloud: Arc<dyn CloudProvisioner>,
    secrets: Arc<dyn SecretStore>,
}

impl Provisioner {
    pub fn new(cloud: Arc<dyn CloudProvisioner>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { cloud, secrets }
    }

    /// Create-or-verify the unit's resource and return its outputs.
    /// Only valid for `kind = infrastructure`.
    pub async fn ensure(&self, unit: &UnitSpec) -> Result<ProvisionedOutputs, ProvisionError> {
        if unit.kind != UnitKind::Infrastructure {
            return Err(ProvisionError::NotInfrastructure(unit.name.clone()));
        }
        // validate_shape guarantees infrastructure units carry a resource spec.
        let spec = unit
            .resource
            .as_ref()
            .ok_or_else(|| ProvisionError::NotInfrastructure(unit.name.clone()))?;

        let record = self
            .cloud
            .ensure_resource(spec)
            .await
            .map_err(|source| ProvisionError::Cloud {
                unit: unit.name.clone(),
                source,
            })?;

        if record.existing {
            check_shape(spec, &record)?;
        }

        let mut outputs = record.outputs;

        for key in &unit.secrets {
            let value = self.ensure_secret(&unit.name, key).await?;
            outputs.insert(key.clone(), value);
        }

        tracing::info!(
            "Resource for {} ready ({} output keys)",
            unit.name,
            outputs.len()
        );

        Ok(outputs)
    }

    /// Fetch-or-generate one secret. Generation happens at most once per
    /// secret name across all runs; the store's first write wins.
    async fn ensure_secret(&self, unit: &UnitName, key: &str) -> Result<String, ProvisionError> {
        let scoped = format!("{unit}/{key}");
        let wrap = |source| ProvisionError::Secrets {
            unit: unit.clone(),
            source,
        };

        if let Some(existing) = self.secrets.get(&scoped).await.map_err(wrap)? {
            return Ok(existing);
        }

        let generated = generate_secret();
        self.secrets.put(&scoped, &generated).await.map_err(wrap)?;
        // Re-read instead of trusting our generated value: another writer may
        // have won the put race, and their value is the persisted one.
        self.secrets
            .get(&scoped)
            .await
            .map_err(wrap)?
            .ok_or_else(|| {
                ProvisionError::Secrets {
                    unit: unit.clone(),
                    source: SecretError::Io(std::io::Error::other(
                        "secret vanished between put and get",
                    )),
                }
            })
    }
}

/// An existing resource must match the declared spec; a silent mismatch
/// (wrong engine version, wrong tier) is worse than a failed run.
fn check_shape(spec: &ResourceSpec, record: &ResourceRecord) -> Result<(), ProvisionError> {
    let checks = [
        ("engine version", &spec.engine_version, "ENGINE_VERSION"),
        ("tier", &spec.tier, "TIER"),
    ];

    for (field, declared, output_key) in checks {
        if let (Some(declared), Some(observed)) = (declared.as_ref(), record.outputs.get(output_key))
        {
            if declared != observed {
                return Err(ProvisionError::ShapeConflict {
                    resource: spec.name.clone(),
                    field,
                    observed: observed.clone(),
                    declared: declared.clone(),
                });
            }
        }
    }

    Ok(())
}
