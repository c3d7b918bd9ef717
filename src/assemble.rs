// ABOUTME: Pure configuration resolution for one unit.
// ABOUTME: Merges overrides, environment, produced outputs, and defaults with fixed precedence.

use crate::manifest::UnitSpec;
use crate::types::UnitName;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("unit {unit} requires configuration key {key} which no source provides")]
    MissingKey { unit: UnitName, key: String },
}

/// Configuration injected into one unit at launch. Contains exactly the keys
/// the unit requires plus its declared static defaults, every value non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    values: BTreeMap<String, String>,
}

impl ResolvedConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_env(&self) -> HashMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Sources a unit's configuration is merged from, in precedence order
/// (highest wins): per-run overrides, environment, outputs produced by
/// upstream infrastructure, unit static env, manifest-wide defaults.
#[derive(Debug)]
pub struct Sources<'a> {
    pub run_overrides: &'a HashMap<String, String>,
    pub env_overrides: &'a HashMap<String, String>,
    pub produced: &'a HashMap<String, String>,
    pub unit_env: &'a HashMap<String, String>,
    pub defaults: &'a HashMap<String, String>,
}

fn empty_map() -> &'static HashMap<String, String> {
    static EMPTY: std::sync::OnceLock<HashMap<String, String>> = std::sync::OnceLock::new();
    EMPTY.get_or_init(HashMap::new)
}

impl Default for Sources<'_> {
    fn default() -> Self {
        Self {
            run_overrides: empty_map(),
            env_overrides: empty_map(),
            produced: empty_map(),
            unit_env: empty_map(),
            defaults: empty_map(),
        }
    }
}

/// Resolve one unit's configuration. Pure: no environment reads, no I/O.
///
/// Every key in the unit's `requires` list must end up present and non-empty;
/// an empty string is treated as missing. Blank values silently reaching a
/// running container is exactly the defect class this exists to stop.
pub fn resolve(unit: &UnitSpec, sources: &Sources<'_>) -> Result<ResolvedConfig, AssembleError> {
    let lookup = |key: &str| -> Option<&str> {
        [
            sources.run_overrides,
            sources.env_overrides,
            sources.produced,
            sources.unit_env,
            sources.defaults,
        ]
        .iter()
        .find_map(|source| source.get(key))
        .map(String::as_str)
        .filter(|v| !v.is_empty())
    };

    let mut values = BTreeMap::new();

    for key in unit.env.keys() {
        if let Some(v) = lookup(key) {
            values.insert(key.clone(), v.to_string());
        }
    }

    for key in &unit.requires {
        match lookup(key) {
            Some(v) => {
                values.insert(key.clone(), v.to_string());
            }
            None => {
                return Err(AssembleError::MissingKey {
                    unit: unit.name.clone(),
                    key: key.clone(),
                });
            }
        }
    }

    Ok(ResolvedConfig { values })
}
