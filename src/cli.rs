// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "convoy")]
#[command(about = "Ordered bring-up orchestrator for multi-service platforms")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output mode
    #[arg(long, global = true, value_enum, default_value_t = OutputModeArg::Normal)]
    pub output: OutputModeArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputModeArg {
    Normal,
    Quiet,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a starter convoy.yml manifest
    Init {
        /// Overwrite an existing manifest
        #[arg(long)]
        force: bool,
    },

    /// Bring the platform up per the manifest
    Deploy {
        /// Path to the unit manifest (default: discover convoy.yml in cwd)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Path to a per-run override config file
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Explicit KEY=VALUE override, repeatable; beats the override file
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Validate, compute batch order and resolved configs, then stop
        #[arg(long)]
        dry_run: bool,

        /// Global deadline for the whole run
        #[arg(long, default_value = "15m", value_parser = humantime::parse_duration)]
        timeout: Duration,
    },

    /// Show past run records
    History {
        /// Path to the unit manifest (locates the state directory)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Maximum number of runs to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}
