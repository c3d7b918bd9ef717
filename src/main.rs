// ABOUTME: Entry point for the convoy CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, OutputModeArg};
use convoy::error::{Error, Result};
use convoy::history::RunHistory;
use convoy::manifest::{Manifest, ManifestError, OverrideFile, UnitKind};
use convoy::output::{Output, OutputMode};
use convoy::provision::{ExecProvisioner, FileSecretStore};
use convoy::run::{Orchestrator, RunOptions, env_overrides_for};
use convoy::runtime::ProcessRuntime;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mode = match cli.output {
        OutputModeArg::Normal => OutputMode::Normal,
        OutputModeArg::Quiet => OutputMode::Quiet,
        OutputModeArg::Json => OutputMode::Json,
    };
    let mut output = Output::new(mode);

    match run(cli, &mut output).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output.error(&e.to_string());
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli, output: &mut Output) -> Result<i32> {
    match cli.command {
        Commands::Init { force } => {
            let cwd = env::current_dir()?;
            let path = convoy::manifest::init_manifest(&cwd, force).map_err(Error::Manifest)?;
            output.progress(&format!("Wrote {}", path.display()));
            Ok(0)
        }
        Commands::Deploy {
            manifest,
            overrides,
            set,
            dry_run,
            timeout,
        } => {
            let manifest = load_manifest(manifest)?;
            let opts = build_options(&manifest, overrides, &set, timeout)?;

            if dry_run {
                dry_run_plan(&manifest, &opts, output)?;
                return Ok(0);
            }

            deploy(manifest, opts, output).await
        }
        Commands::History { manifest, limit } => {
            let manifest = load_manifest(manifest)?;
            let history = RunHistory::new(&manifest.state_dir);
            let runs = history.load(limit).map_err(|e| Error::History(e.to_string()))?;

            if runs.is_empty() {
                output.progress("No recorded runs");
            }
            for report in &runs {
                output.progress(&format!(
                    "{}  {:?}  {} unit(s), {:.1}s{}",
                    report.started_at.format("%Y-%m-%d %H:%M:%S"),
                    report.verdict,
                    report.units.len(),
                    report.elapsed_secs,
                    report
                        .first_failure
                        .as_deref()
                        .map(|f| format!("  first failure: {f}"))
                        .unwrap_or_default(),
                ));
            }
            Ok(0)
        }
    }
}

fn load_manifest(path: Option<PathBuf>) -> Result<Manifest> {
    match path {
        Some(path) => Ok(Manifest::load(&path)?),
        None => {
            let cwd = env::current_dir()?;
            Ok(Manifest::discover(&cwd)?)
        }
    }
}

/// Assemble run options: override file plus `--set` pairs form the per-run
/// overrides (`--set` wins), environment-sourced overrides are snapshotted
/// here so the run itself never reads the environment.
fn build_options(
    manifest: &Manifest,
    overrides: Option<PathBuf>,
    set: &[String],
    timeout: Duration,
) -> Result<RunOptions> {
    let mut run_overrides: HashMap<String, String> = match overrides {
        Some(path) => OverrideFile::load(&path)?.resolve()?,
        None => HashMap::new(),
    };

    for pair in set {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ManifestError::InvalidOverride(pair.clone()))?;
        run_overrides.insert(key.to_string(), value.to_string());
    }

    Ok(RunOptions {
        run_overrides,
        env_overrides: env_overrides_for(manifest),
        timeout,
    })
}

fn dry_run_plan(manifest: &Manifest, opts: &RunOptions, output: &Output) -> Result<()> {
    let plan = Orchestrator::plan(manifest, opts)?;

    for (index, batch) in plan.batches.iter().enumerate() {
        let names: Vec<&str> = batch.iter().map(|n| n.as_str()).collect();
        output.progress(&format!("Batch {}: {}", index, names.join(", ")));
    }

    output.progress("");
    for (name, config) in &plan.configs {
        output.progress(&format!("{name}:"));
        for (key, value) in config.iter() {
            output.progress(&format!("  {key}={value}"));
        }
    }

    Ok(())
}

async fn deploy(manifest: Manifest, opts: RunOptions, output: &mut Output) -> Result<i32> {
    let has_infrastructure = manifest
        .units()
        .any(|u| u.kind == UnitKind::Infrastructure);
    let provisioner_command = match (&manifest.provisioner, has_infrastructure) {
        (Some(config), _) => Some(config.command.clone()),
        (None, true) => return Err(ManifestError::ProvisionerRequired.into()),
        (None, false) => None,
    };

    let runtime = Arc::new(ProcessRuntime::new());
    let secrets = Arc::new(FileSecretStore::new(manifest.state_dir.join("secrets.json")));
    // Without infrastructure units the cloud collaborator is never called;
    // a provisioner that rejects everything keeps that invariant loud.
    let cloud: Arc<dyn convoy::provision::CloudProvisioner> = match provisioner_command {
        Some(command) => Arc::new(ExecProvisioner::new(command)),
        None => Arc::new(ExecProvisioner::new(
            convoy::manifest::StartDirective::new(vec!["false".to_string()])
                .expect("static directive is non-empty"),
        )),
    };

    let orchestrator = Orchestrator::new(runtime, cloud, secrets);

    output.start_timer();
    output.progress(&format!(
        "Deploying {} unit(s), timeout {}",
        manifest.units().count(),
        humantime::format_duration(opts.timeout)
    ));

    let report = orchestrator.run(&manifest, &opts).await?;

    output.report(&report);

    let history = RunHistory::new(&manifest.state_dir);
    if let Err(e) = history.record(&report) {
        // The run itself finished; a failed audit write must not change the
        // verdict, only be visible.
        output.error(&format!("failed to record run history: {e}"));
    }

    Ok(report.verdict.exit_code())
}
