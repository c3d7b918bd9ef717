// ABOUTME: Readiness probe configuration for deployable units.
// ABOUTME: Defines HTTP, TCP, and exec probe targets with timing defaults.

use serde::Deserialize;
use std::time::Duration;

/// Readiness probe descriptor: what to check and how often.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeSpec {
    #[serde(flatten)]
    pub target: ProbeTarget,

    /// Wait between failed attempts.
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Per-attempt timeout. An attempt that overruns counts as failed.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Attempt budget before the unit is declared unhealthy.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

/// Protocol-level check target. Exactly one of `http`, `tcp`, or `exec`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProbeTarget {
    Http {
        /// URL probed with a GET request.
        http: String,
        #[serde(default = "default_expect_status")]
        expect_status: u16,
    },
    Tcp {
        /// `host:port` that must accept a connection.
        tcp: String,
    },
    Exec {
        /// Command that must exit zero.
        exec: Vec<String>,
    },
}

fn default_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_attempts() -> u32 {
    12
}

fn default_expect_status() -> u16 {
    200
}
