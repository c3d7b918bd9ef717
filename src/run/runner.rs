// ABOUTME: The batch loop: provision, resolve, launch, and verify units in dependency order.
// ABOUTME: Enforces the global deadline and the kind-based failure policy.

use super::launcher;
use super::report::{self, DeploymentReport};
use super::state::{StateTable, UnitState};
use super::verifier;
use crate::assemble::{self, ResolvedConfig, Sources};
use crate::error::{Error, ValidationError};
use crate::graph::{self, Batch};
use crate::manifest::{Manifest, UnitKind, UnitSpec, resolve_env_map};
use crate::provision::{CloudProvisioner, Provisioner, SecretStore};
use crate::runtime::Runtime;
use crate::types::UnitName;
use chrono::Utc;
use futures::future;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Knobs for one orchestration run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Explicit per-run overrides, highest configuration precedence.
    pub run_overrides: HashMap<String, String>,

    /// Environment-sourced overrides, second precedence.
    pub env_overrides: HashMap<String, String>,

    /// Global deadline for the whole run.
    pub timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run_overrides: HashMap::new(),
            env_overrides: HashMap::new(),
            timeout: Duration::from_secs(15 * 60),
        }
    }
}

/// What a dry run computes: batch order plus every unit's resolved config,
/// with promised infrastructure outputs shown as placeholders.
#[derive(Debug)]
pub struct Plan {
    pub batches: Vec<Batch>,
    pub configs: Vec<(UnitName, ResolvedConfig)>,
}

struct UnitOutcome {
    halt_run: bool,
}

struct RunCtx<'a> {
    table: &'a StateTable,
    produced: &'a Mutex<HashMap<String, String>>,
    defaults: &'a HashMap<String, String>,
    unit_envs: &'a HashMap<UnitName, HashMap<String, String>>,
    opts: &'a RunOptions,
}

/// Sequences one run end to end. Collaborators come in as trait objects so
/// tests drive the whole loop without a container engine or cloud account.
pub struct Orchestrator {
    runtime: Arc<dyn Runtime>,
    provisioner: Provisioner,
}

impl Orchestrator {
    pub fn new(
        runtime: Arc<dyn Runtime>,
        cloud: Arc<dyn CloudProvisioner>,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            runtime,
            provisioner: Provisioner::new(cloud, secrets),
        }
    }

    /// Validate the manifest and compute the plan without any side effect:
    /// no provisioning, no launches, no probes. This is the whole of
    /// `--dry-run`, and `run` executes it first so validation errors always
    /// precede collaborator calls.
    pub fn plan(manifest: &Manifest, opts: &RunOptions) -> Result<Plan, Error> {
        let units: Vec<&UnitSpec> = manifest.units().collect();
        let batches = graph::build(&units).map_err(ValidationError::from)?;

        let defaults = resolve_env_map(&manifest.defaults).map_err(manifest_err)?;

        // Keys infrastructure promises to produce are unknowable before
        // provisioning; stand them in with placeholders so the required-key
        // check still runs for every unit.
        let mut placeholder = HashMap::new();
        for unit in &units {
            for key in &unit.produces {
                placeholder.insert(key.clone(), format!("<produced by {}>", unit.name));
            }
        }

        let mut configs = Vec::new();
        for unit in &units {
            let unit_env = resolve_env_map(&unit.env).map_err(manifest_err)?;
            let sources = Sources {
                run_overrides: &opts.run_overrides,
                env_overrides: &opts.env_overrides,
                produced: &placeholder,
                unit_env: &unit_env,
                defaults: &defaults,
            };
            let config = assemble::resolve(unit, &sources).map_err(ValidationError::from)?;
            configs.push((unit.name.clone(), config));
        }

        Ok(Plan { batches, configs })
    }

    /// Execute the run: batches strictly in order, units within a batch
    /// concurrently, everything under one deadline.
    pub async fn run(
        &self,
        manifest: &Manifest,
        opts: &RunOptions,
    ) -> Result<DeploymentReport, Error> {
        let plan = Self::plan(manifest, opts)?;

        let units: Vec<&UnitSpec> = manifest.units().collect();
        let defaults = resolve_env_map(&manifest.defaults).map_err(manifest_err)?;
        let mut unit_envs = HashMap::new();
        for unit in &units {
            unit_envs.insert(
                unit.name.clone(),
                resolve_env_map(&unit.env).map_err(manifest_err)?,
            );
        }

        let table = StateTable::new(units.iter().map(|u| &u.name));
        let produced = Mutex::new(HashMap::new());
        let ctx = RunCtx {
            table: &table,
            produced: &produced,
            defaults: &defaults,
            unit_envs: &unit_envs,
            opts,
        };

        let started_at = Utc::now();
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + opts.timeout;
        let mut timed_out = false;

        'batches: for (index, batch) in plan.batches.iter().enumerate() {
            let runnable: Vec<&UnitSpec> = batch
                .iter()
                .filter_map(|name| {
                    let unit = *units.iter().find(|u| &u.name == name)?;
                    if unit.depends_on.iter().all(|d| table.is_healthy(d)) {
                        Some(unit)
                    } else {
                        // A dependency failed upstream; this unit never
                        // starts and stays Pending in the report.
                        tracing::info!("Skipping {}: dependency not healthy", name);
                        None
                    }
                })
                .collect();

            if runnable.is_empty() {
                continue;
            }

            tracing::info!("Batch {}: launching {} unit(s)", index, runnable.len());

            let workers = runnable.iter().map(|unit| self.run_unit(unit, &ctx));
            match tokio::time::timeout_at(deadline, future::join_all(workers)).await {
                Ok(outcomes) => {
                    if outcomes.iter().any(|o| o.halt_run) {
                        tracing::error!("Load-bearing unit failed, halting run");
                        break 'batches;
                    }
                }
                Err(_) => {
                    // Deadline fired mid-batch: outstanding probes are
                    // dropped with the joined future, nothing keeps polling.
                    timed_out = true;
                    let cause = format!(
                        "run timeout of {} exceeded",
                        humantime::format_duration(opts.timeout)
                    );
                    for name in batch.iter() {
                        if !table.is_healthy(name) {
                            table.fail(name, &cause);
                        }
                    }
                    break 'batches;
                }
            }
        }

        let report = report::summarize(
            &units,
            &table,
            started_at,
            start.elapsed().as_secs_f64(),
            timed_out,
        );
        Ok(report)
    }

    /// One unit's worker: provision (infrastructure only), resolve config,
    /// launch, verify. Writes only its own state table entry.
    async fn run_unit(&self, unit: &UnitSpec, ctx: &RunCtx<'_>) -> UnitOutcome {
        let name = &unit.name;
        let halt = UnitOutcome { halt_run: true };
        let per_policy = UnitOutcome {
            halt_run: unit.is_required(),
        };

        if unit.kind == UnitKind::Infrastructure {
            ctx.table.set(name, UnitState::Provisioning);
            match self.provisioner.ensure(unit).await {
                Ok(outputs) => {
                    ctx.produced.lock().extend(outputs);
                }
                Err(e) => {
                    // Provisioning failures always abort the run, never a
                    // silent retry with different parameters.
                    ctx.table.fail(name, &e.to_string());
                    return halt;
                }
            }
        }

        let config = {
            let produced = ctx.produced.lock().clone();
            let empty = HashMap::new();
            let unit_env = ctx.unit_envs.get(name).unwrap_or(&empty);
            let sources = Sources {
                run_overrides: &ctx.opts.run_overrides,
                env_overrides: &ctx.opts.env_overrides,
                produced: &produced,
                unit_env,
                defaults: ctx.defaults,
            };
            match assemble::resolve(unit, &sources) {
                Ok(config) => config,
                Err(e) => {
                    // Preflight passed, so a promised key went missing at
                    // provisioning time. Hard stop, never a blank value.
                    ctx.table.fail(name, &e.to_string());
                    return halt;
                }
            }
        };

        ctx.table.set(name, UnitState::Starting);
        if let Err(e) = launcher::start_unit(self.runtime.as_ref(), unit, &config).await {
            ctx.table.fail(name, &e.to_string());
            return per_policy;
        }

        match verifier::await_healthy(self.runtime.as_ref(), unit, ctx.table).await {
            Ok(()) => UnitOutcome { halt_run: false },
            Err(e) => {
                ctx.table.fail(name, &e.to_string());
                per_policy
            }
        }
    }
}

fn manifest_err(e: crate::manifest::EnvValueError) -> Error {
    Error::Manifest(e.into())
}

/// Environment-sourced overrides: every key the manifest mentions anywhere
/// that is set and non-empty in the process environment. Collected once at
/// startup so the run itself never reads the environment.
pub fn env_overrides_for(manifest: &Manifest) -> HashMap<String, String> {
    let mut keys: HashSet<&str> = HashSet::new();
    for key in manifest.defaults.keys() {
        keys.insert(key);
    }
    for unit in manifest.units() {
        for key in unit
            .requires
            .iter()
            .chain(unit.produces.iter())
            .chain(unit.env.keys())
        {
            keys.insert(key);
        }
    }

    keys.into_iter()
        .filter_map(|key| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| (key.to_string(), v))
        })
        .collect()
}
