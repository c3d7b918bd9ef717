// ABOUTME: Manifest types and parsing for convoy.yml.
// ABOUTME: Handles YAML parsing, structural validation, and override files.

mod env_value;
mod probe;
mod unit;

pub use env_value::{EnvValue, EnvValueError, resolve_env_map};
pub use probe::{ProbeSpec, ProbeTarget};
pub use unit::{ResourceSpec, StartDirective, UnitKind, UnitSpec};

use crate::types::UnitName;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILENAME: &str = "convoy.yml";
pub const MANIFEST_FILENAME_ALT: &str = "convoy.yaml";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest file not found: {0}")]
    NotFound(PathBuf),

    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("duplicate unit name: {0}")]
    DuplicateUnit(UnitName),

    #[error("unit {unit} is kind {kind} but declares a resource spec")]
    UnexpectedResource { unit: UnitName, kind: UnitKind },

    #[error("infrastructure unit {0} declares no resource spec")]
    MissingResource(UnitName),

    #[error("unit {unit} declares produced keys but is kind {kind}")]
    UnexpectedProduces { unit: UnitName, kind: UnitKind },

    #[error("unit {unit} lists secret {key} that is not in its produced keys")]
    SecretNotProduced { unit: UnitName, key: String },

    #[error("manifest declares infrastructure units but no provisioner command")]
    ProvisionerRequired,

    #[error("invalid override, expected KEY=VALUE: {0}")]
    InvalidOverride(String),

    #[error(transparent)]
    EnvValue(#[from] EnvValueError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Command the binary shells out to for cloud resource provisioning.
/// The original platform wrapped its cloud CLI the same way.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionerConfig {
    pub command: StartDirective,
}

/// Static declaration of everything one orchestration run brings up.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Shared static defaults, lowest configuration precedence.
    #[serde(default)]
    pub defaults: HashMap<String, EnvValue>,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub provisioner: Option<ProvisionerConfig>,

    #[serde(deserialize_with = "deserialize_units")]
    pub units: NonEmpty<UnitSpec>,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".convoy")
}

impl Manifest {
    pub fn from_yaml(yaml: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_yaml::from_str(yaml)?;
        manifest.validate_shape()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        if !path.exists() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self, ManifestError> {
        let candidates = [dir.join(MANIFEST_FILENAME), dir.join(MANIFEST_FILENAME_ALT)];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(ManifestError::NotFound(dir.join(MANIFEST_FILENAME)))
    }

    /// Units in declaration order. Ordering is load-bearing: batch tie-breaks
    /// and reports follow it.
    pub fn units(&self) -> impl Iterator<Item = &UnitSpec> {
        self.units.iter()
    }

    pub fn unit(&self, name: &UnitName) -> Option<&UnitSpec> {
        self.units.iter().find(|u| &u.name == name)
    }

    /// Every key any infrastructure unit promises to produce.
    pub fn produced_keys(&self) -> HashSet<&str> {
        self.units
            .iter()
            .flat_map(|u| u.produces.iter().map(String::as_str))
            .collect()
    }

    /// Structural checks that do not depend on the dependency graph:
    /// name uniqueness, resource/kind agreement, secret declarations.
    fn validate_shape(&self) -> Result<(), ManifestError> {
        let mut seen = HashSet::new();
        for unit in self.units.iter() {
            if !seen.insert(unit.name.clone()) {
                return Err(ManifestError::DuplicateUnit(unit.name.clone()));
            }

            match unit.kind {
                UnitKind::Infrastructure => {
                    if unit.resource.is_none() {
                        return Err(ManifestError::MissingResource(unit.name.clone()));
                    }
                }
                kind => {
                    if unit.resource.is_some() {
                        return Err(ManifestError::UnexpectedResource {
                            unit: unit.name.clone(),
                            kind,
                        });
                    }
                    if !unit.produces.is_empty() {
                        return Err(ManifestError::UnexpectedProduces {
                            unit: unit.name.clone(),
                            kind,
                        });
                    }
                }
            }

            for key in &unit.secrets {
                if !unit.produces.contains(key) {
                    return Err(ManifestError::SecretNotProduced {
                        unit: unit.name.clone(),
                        key: key.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn deserialize_units<'de, D>(deserializer: D) -> Result<NonEmpty<UnitSpec>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let units = Vec::<UnitSpec>::deserialize(deserializer)?;
    NonEmpty::from_vec(units)
        .ok_or_else(|| serde::de::Error::custom("manifest must declare at least one unit"))
}

/// Per-run override file: a flat map of key to value, highest precedence.
/// Values may reference environment variables the same way unit env does.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverrideFile {
    #[serde(flatten)]
    values: HashMap<String, EnvValue>,
}

impl OverrideFile {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        if !path.exists() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Interpolate every value against the current environment.
    pub fn resolve(&self) -> Result<HashMap<String, String>, ManifestError> {
        Ok(resolve_env_map(&self.values)?)
    }
}

/// Write a starter manifest into `dir`.
pub fn init_manifest(dir: &Path, force: bool) -> Result<PathBuf, ManifestError> {
    let path = dir.join(MANIFEST_FILENAME);

    if path.exists() && !force {
        return Err(ManifestError::AlreadyExists(path));
    }

    std::fs::write(&path, TEMPLATE_YAML)?;
    Ok(path)
}

const TEMPLATE_YAML: &str = r#"defaults:
  LOG_LEVEL: info

provisioner:
  command: ["./scripts/provision.sh"]

units:
  - name: postgres
    kind: infrastructure
    resource:
      kind: postgres
      name: platform-db
      tier: small
      engine_version: "16"
    produces: [DATABASE_HOST, DATABASE_PORT, DATABASE_PASSWORD]
    secrets: [DATABASE_PASSWORD]
    requires: [DATABASE_PASSWORD]
    start: ["docker", "compose", "up", "-d", "postgres"]
    probe:
      tcp: localhost:5432
      interval: 2s
      attempts: 30

  - name: api
    kind: service
    depends_on: [postgres]
    requires: [DATABASE_HOST, DATABASE_PASSWORD, LOG_LEVEL]
    start: ["docker", "compose", "up", "-d", "api"]
    probe:
      http: http://localhost:8080/health
      interval: 5s
      attempts: 12

  - name: gateway
    kind: gateway
    depends_on: [api]
    requires: [LOG_LEVEL]
    start: ["docker", "compose", "up", "-d", "gateway"]
    probe:
      http: http://localhost:80/
      expect_status: 200
"#;
