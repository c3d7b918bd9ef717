// ABOUTME: DNS-compatible unit name validation.
// ABOUTME: Unit names follow RFC 1123 label requirements so they can double as hostnames.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// RFC 1123 label limit.
const MAX_LEN: usize = 63;

#[derive(Debug, Error)]
pub enum UnitNameError {
    #[error("unit name is empty")]
    Empty,

    #[error("unit name is longer than {MAX_LEN} characters")]
    TooLong,

    #[error("unit name begins or ends with '-'")]
    HyphenAtEdge,

    #[error("unit name contains '{0}': use lowercase letters, digits, and '-'")]
    InvalidChar(char),
}

/// Name of one deployable unit. Unique within a manifest, and constrained to
/// RFC 1123 labels so the name can serve directly as a hostname or DNS alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UnitName(String);

impl UnitName {
    pub fn new(value: &str) -> Result<Self, UnitNameError> {
        if value.is_empty() {
            return Err(UnitNameError::Empty);
        }
        if value.len() > MAX_LEN {
            return Err(UnitNameError::TooLong);
        }
        if value.starts_with('-') || value.ends_with('-') {
            return Err(UnitNameError::HyphenAtEdge);
        }

        let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-';
        match value.chars().find(|&c| !allowed(c)) {
            Some(c) => Err(UnitNameError::InvalidChar(c)),
            None => Ok(Self(value.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for UnitName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        UnitName::new(&s).map_err(serde::de::Error::custom)
    }
}
