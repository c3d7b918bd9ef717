// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use crate::run::DeploymentReport;
use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: if self.start_time.is_some() {
                        Some(self.elapsed_secs())
                    } else {
                        None
                    },
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Render the final deployment report.
    pub fn report(&self, report: &DeploymentReport) {
        match self.mode {
            OutputMode::Normal => {
                println!();
                for unit in &report.units {
                    let marker = match unit.state {
                        crate::run::UnitState::Healthy => "✓",
                        crate::run::UnitState::Failed => "✗",
                        _ => "·",
                    };
                    let required = if unit.required { "" } else { " (optional)" };
                    println!(
                        "  {} {:<24} {:<14} {}{}",
                        marker, unit.name, unit.kind, unit.state, required
                    );
                    if let Some(ref cause) = unit.first_error {
                        println!("      first error: {cause}");
                    }
                }
                println!();
                let counts: Vec<String> = report
                    .counts()
                    .into_iter()
                    .map(|(state, n)| format!("{n} {state}"))
                    .collect();
                println!("  {} ({:.1}s)", counts.join(", "), report.elapsed_secs);
                println!("  Verdict: {:?}", report.verdict);
            }
            OutputMode::Quiet => {
                println!("{:?}", report.verdict);
            }
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(report) {
                    println!("{json}");
                }
            }
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
