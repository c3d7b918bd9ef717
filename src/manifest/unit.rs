// ABOUTME: Deployable unit declaration: kind, dependencies, start directive, config keys.
// ABOUTME: Units are immutable for the duration of one orchestration run.

use super::env_value::EnvValue;
use super::probe::ProbeSpec;
use crate::types::UnitName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// What role a unit plays in the platform. Drives the default failure policy:
/// infrastructure and gateway units are load-bearing, services are optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Infrastructure,
    Service,
    Gateway,
}

impl UnitKind {
    /// Whether a failure of this kind of unit halts the whole run by default.
    pub fn required_by_default(self) -> bool {
        !matches!(self, UnitKind::Service)
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitKind::Infrastructure => "infrastructure",
            UnitKind::Service => "service",
            UnitKind::Gateway => "gateway",
        };
        write!(f, "{s}")
    }
}

/// How to launch a unit. Opaque to the orchestrator: the runtime collaborator
/// interprets it. First element is the program, the rest are arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartDirective(Vec<String>);

impl StartDirective {
    pub fn new(argv: Vec<String>) -> Result<Self, String> {
        if argv.is_empty() {
            return Err("start directive cannot be empty".to_string());
        }
        Ok(Self(argv))
    }

    pub fn program(&self) -> &str {
        &self.0[0]
    }

    pub fn args(&self) -> &[String] {
        &self.0[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for StartDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

impl<'de> Deserialize<'de> for StartDirective {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let argv = Vec::<String>::deserialize(deserializer)?;
        StartDirective::new(argv).map_err(serde::de::Error::custom)
    }
}

/// Declarative description of an external resource backing an infrastructure
/// unit. Handed verbatim to the cloud provisioning collaborator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceSpec {
    /// Resource kind understood by the provisioner (e.g. "postgres", "redis").
    pub kind: String,

    /// Stable identifier used for idempotent create-or-verify.
    pub name: String,

    #[serde(default)]
    pub tier: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub engine_version: Option<String>,
}

/// One deployable piece of the platform, declared in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitSpec {
    pub name: UnitName,

    pub kind: UnitKind,

    /// Names of units that must be healthy before this one starts.
    #[serde(default)]
    pub depends_on: Vec<UnitName>,

    pub start: StartDirective,

    pub probe: ProbeSpec,

    /// Configuration keys that must be present and non-empty at launch.
    #[serde(default)]
    pub requires: Vec<String>,

    /// Configuration keys this unit emits for downstream units.
    /// Only meaningful for infrastructure units.
    #[serde(default)]
    pub produces: Vec<String>,

    /// Subset of `produces` that are generated-once secrets.
    #[serde(default)]
    pub secrets: Vec<String>,

    /// Static per-unit defaults, lowest precedence after manifest defaults.
    #[serde(default)]
    pub env: HashMap<String, EnvValue>,

    /// External resource to provision before launching. Infrastructure only.
    #[serde(default)]
    pub resource: Option<ResourceSpec>,

    /// Overrides the kind-based failure policy for this unit.
    #[serde(default)]
    pub required: Option<bool>,
}

impl UnitSpec {
    /// Whether a terminal failure of this unit halts the whole run.
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or_else(|| self.kind.required_by_default())
    }
}
