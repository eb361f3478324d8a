// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! `forge` binary entry point: wires configuration, discovery, the target
//! graph, the cache/store pair, the scheduler, and verification together
//! behind the command surface in [`forge::cli`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use forge::cache::ActionCache;
use forge::checkpoint::Checkpoint;
use forge::cli::{Cli, Command};
use forge::config::{self, TargetDecl, WorkspaceConfig};
use forge::determinism;
use forge::driver::DriverRegistry;
use forge::error::{Error, ExitCode};
use forge::executor::Executor;
use forge::graph::{Graph, Status, TargetId};
use forge::incremental::{self, IncrementalState, InvalidationStrategy};
use forge::remote::{RemoteCache, RemoteCacheConfig};
use forge::sandbox::{FallbackSandbox, Sandbox};
use forge::scheduler::{BuildReport, DrainFlag, Scheduler};
use forge::store::Store;
use forge::{discovery, query, verify};

const CHECKPOINT_FILE_NAME: &str = "checkpoint.postcard";

fn init_logging() {
    let filter = EnvFilter::try_from_env("FORGE_LOG").unwrap_or_else(|_| EnvFilter::new("off"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Install the process-wide `SIGINT`/`SIGTERM` handler exactly once and
/// return the flag it writes to (§4.H, §9). The handler itself never touches
/// the graph or scheduler directly — it only flips an atomic bit; the
/// scheduler is what decides when it's safe to actually stop between rounds.
fn install_signal_handler() -> DrainFlag {
    let drain = DrainFlag::new();
    let handler_flag = drain.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, draining in-flight work before stopping");
        handler_flag.set();
    }) {
        tracing::warn!(%err, "failed to install signal handler; Ctrl-C will not drain cleanly");
    }
    drain
}

fn main() {
    init_logging();
    let drain = install_signal_handler();

    let exit_code = match run(drain) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("forge: {err}");
            ExitCode::from(&err)
        }
    };

    std::process::exit(exit_code as i32);
}

/// Everything a running build needs, assembled once per invocation from the
/// resolved workspace config.
struct Workspace {
    root: PathBuf,
    config: WorkspaceConfig,
    graph: Graph,
    drivers: DriverRegistry,
    store: Arc<Store>,
    cache: Arc<ActionCache>,
    sandbox: Arc<dyn Sandbox>,
}

impl Workspace {
    fn open(cli: &Cli) -> Result<Self, Error> {
        let cwd = std::env::current_dir().map_err(|source| Error::Io {
            path: PathBuf::from("."),
            source,
        })?;

        let config_path = discovery::resolve_config(cli.config.as_deref(), &cwd)?;
        let root = config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone());

        let mut workspace_config = match &config_path {
            Some(path) => config::load(path)?,
            None => WorkspaceConfig {
                version: config::SUPPORTED_VERSION,
                ..Default::default()
            },
        };

        if let Some(determinism) = cli.determinism {
            workspace_config.sandbox.determinism = determinism.into();
        }
        if let Some(parallelism) = cli.parallelism {
            workspace_config.scheduler.max_parallelism = Some(parallelism);
        }

        let decls = collect_target_decls(&root, &workspace_config)?;
        let graph =
            forge::analyzer::build_graph(&decls, &root, &workspace_config.project.exclude)?;

        let cache_dir = root.join(&workspace_config.cache.dir);
        let store = Arc::new(Store::open(
            cache_dir.clone(),
            workspace_config.cache.max_bytes,
        )?);

        let remote = match &workspace_config.cache.remote {
            Some(section) => {
                let auth_token = section
                    .auth_token_env
                    .as_ref()
                    .and_then(|var| std::env::var(var).ok());
                Some(RemoteCache::new(RemoteCacheConfig {
                    endpoint: section.endpoint.clone(),
                    auth_token,
                    timeout: Duration::from_millis(section.timeout_ms),
                })?)
            }
            None => None,
        };
        let cache = Arc::new(ActionCache::open_with_max_age(
            cache_dir.clone(),
            store.clone(),
            remote,
            Duration::from_secs(workspace_config.cache.max_age_secs),
        )?);

        let output_dir = root.join(&workspace_config.project.output_dir);
        let scratch_root = cache_dir.join("scratch");
        let sandbox: Arc<dyn Sandbox> =
            Arc::new(FallbackSandbox::new(root.clone(), output_dir, scratch_root));

        Ok(Self {
            root,
            config: workspace_config,
            graph,
            drivers: DriverRegistry::default(),
            store,
            cache,
            sandbox,
        })
    }

    fn checkpoint_path(&self) -> PathBuf {
        self.root
            .join(&self.config.cache.dir)
            .join(CHECKPOINT_FILE_NAME)
    }

    fn incremental_state_path(&self) -> PathBuf {
        self.root
            .join(&self.config.cache.dir)
            .join(incremental::STATE_FILE_NAME)
    }

    fn determinism_violations_path(&self) -> PathBuf {
        self.root
            .join(&self.config.cache.dir)
            .join(determinism::STATE_FILE_NAME)
    }

    /// Refresh the per-source change-detection state and log the set of
    /// targets a changed source reaches. The action cache's own
    /// content-addressed fingerprinting is what actually skips unaffected
    /// work on the next build; this pass exists to keep that cheap metadata
    /// fast path (§4.K) warm and to surface what changed.
    fn refresh_incremental_state(&self) -> Result<(), Error> {
        let mut state = IncrementalState::open(self.incremental_state_path())?;
        let mut changed = std::collections::HashSet::new();

        for idx in self.graph.all_indices() {
            for source in &self.graph.node_at(idx).target.sources {
                if state.has_changed(source).unwrap_or(true) {
                    changed.insert(source.clone());
                }
                state.record(source)?;
            }
        }

        let affected =
            incremental::affected_targets(&self.graph, &changed, InvalidationStrategy::Incremental);
        info!(
            changed = changed.len(),
            affected = affected.len(),
            "incremental change detection"
        );

        state.persist()?;
        Ok(())
    }

    fn build(&self, target: Option<&str>, drain: DrainFlag) -> Result<BuildReport, Error> {
        self.refresh_incremental_state()?;

        if let Some(id) = target {
            restrict_to_target(&self.graph, id)?;
        }

        let executor = Executor::new(
            self.store.clone(),
            self.cache.clone(),
            self.sandbox.clone(),
            self.root.clone(),
            self.root.join(&self.config.project.output_dir),
            self.config.sandbox.determinism,
        );
        let violations = executor.violations_handle();
        let scheduler = Scheduler::new(
            &self.graph,
            executor,
            &self.config.scheduler,
            &self.config.retry,
            &self.drivers,
            &self.config.sandbox,
        )?
        .with_drain_flag(drain);
        let report = scheduler.run()?;

        if self.config.checkpoint.enabled {
            let checkpoint = Checkpoint::capture(&self.graph);
            checkpoint.save(&self.checkpoint_path())?;
        }
        self.cache.persist()?;
        violations.persist(self.determinism_violations_path())?;

        Ok(report)
    }
}

/// Merge `forge.toml`'s inline `targets` with every per-package
/// `BUILD.toml` the walker finds (§10.M).
fn collect_target_decls(root: &Path, config: &WorkspaceConfig) -> Result<Vec<TargetDecl>, Error> {
    let mut decls = config.targets.clone();
    for build_file in discovery::find_build_files(root, &config.project.exclude) {
        decls.extend(config::load_build_file(&build_file)?);
    }
    Ok(decls)
}

/// Validate that `target` resolves to a known node before handing the
/// graph to the scheduler. A single-target build still schedules the whole
/// graph — every other target either sits outside `target`'s transitive
/// closure (and the action cache turns its unrelated work into a near-free
/// hit once built once) or is itself a dependency `target` needs anyway.
fn restrict_to_target(graph: &Graph, target: &str) -> Result<(), Error> {
    let id = TargetId::new(target);
    if graph.index_of(&id).is_none() {
        let suggestions = forge::analyzer::suggest(
            target,
            graph.all_indices().map(|idx| graph.node_at(idx).target.id.as_str()),
        );
        return Err(Error::TargetNotFound { id, suggestions });
    }
    Ok(())
}

fn print_report(report: &BuildReport) {
    for entry in &report.targets {
        match entry.status {
            Status::Success => info!(target = %entry.target, "built"),
            Status::Cached => info!(target = %entry.target, "cached"),
            Status::Failed => eprintln!(
                "forge: {} failed: {}",
                entry.target,
                entry.error.as_deref().unwrap_or("unknown error")
            ),
            _ => {}
        }
    }
}

fn run(drain: DrainFlag) -> Result<ExitCode, Error> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Build(args) => {
            let workspace = Workspace::open(&cli)?;
            let report = workspace.build(args.target.as_deref(), drain)?;
            print_report(&report);
            Ok(if report.succeeded() {
                ExitCode::Success
            } else {
                ExitCode::BuildFailed
            })
        }

        Command::Test(args) => {
            let workspace = Workspace::open(&cli)?;
            let report = workspace.build(args.target.as_deref(), drain)?;
            print_report(&report);
            Ok(if report.succeeded() {
                ExitCode::Success
            } else {
                ExitCode::BuildFailed
            })
        }

        Command::Clean => {
            let workspace = Workspace::open(&cli)?;
            let cache_dir = workspace.root.join(&workspace.config.cache.dir);
            let output_dir = workspace.root.join(&workspace.config.project.output_dir);
            for dir in [&cache_dir, &output_dir] {
                if dir.exists() {
                    std::fs::remove_dir_all(dir).map_err(|source| Error::Io {
                        path: dir.clone(),
                        source,
                    })?;
                }
            }
            Ok(ExitCode::Success)
        }

        Command::Graph(args) => {
            let workspace = Workspace::open(&cli)?;
            let expr = args.target.clone().unwrap_or_else(|| "all".to_string());
            let result = query::run(&workspace.graph, &expr)?;
            for id in result.targets() {
                println!("{id}");
            }
            Ok(ExitCode::Success)
        }

        Command::Query(args) => {
            let workspace = Workspace::open(&cli)?;
            let result = query::run(&workspace.graph, &args.expression)?;
            for id in result.targets() {
                println!("{id}");
            }
            Ok(ExitCode::Success)
        }

        Command::Resume(args) => {
            let workspace = Workspace::open(&cli)?;
            let checkpoint_path = workspace.checkpoint_path();
            let checkpoint = Checkpoint::load(&checkpoint_path)?;

            if !checkpoint.is_fresh(Duration::from_secs(workspace.config.checkpoint.max_age_secs))
                || !checkpoint.is_valid_for(&workspace.graph)
            {
                eprintln!("forge: checkpoint stale or incompatible, rebuilding from scratch");
            }

            workspace.refresh_incremental_state()?;

            let executor = Executor::new(
                workspace.store.clone(),
                workspace.cache.clone(),
                workspace.sandbox.clone(),
                workspace.root.clone(),
                workspace.root.join(&workspace.config.project.output_dir),
                workspace.config.sandbox.determinism,
            );
            let violations = executor.violations_handle();
            let scheduler = Scheduler::new(
                &workspace.graph,
                executor,
                &workspace.config.scheduler,
                &workspace.config.retry,
                &workspace.drivers,
                &workspace.config.sandbox,
            )?
            .with_drain_flag(drain);
            let report = scheduler.resume(&checkpoint, args.strategy.into())?;
            print_report(&report);

            if workspace.config.checkpoint.enabled {
                Checkpoint::capture(&workspace.graph).save(&checkpoint_path)?;
            }
            workspace.cache.persist()?;
            violations.persist(workspace.determinism_violations_path())?;

            Ok(if report.succeeded() {
                ExitCode::Success
            } else {
                ExitCode::BuildFailed
            })
        }

        Command::Verify(args) => {
            let workspace = Workspace::open(&cli)?;
            if let Some(id) = &args.target {
                restrict_to_target(&workspace.graph, id)?;
            }
            let violations =
                determinism::DeterminismLog::open(workspace.determinism_violations_path())
                    .to_set();
            let certificate = verify::verify(
                &workspace.graph,
                workspace.config.sandbox.determinism,
                &violations,
            );
            let json = serde_json::to_string_pretty(&certificate)
                .unwrap_or_else(|_| format!("{certificate:?}"));
            println!("{json}");
            Ok(if certificate.passed() {
                ExitCode::Success
            } else {
                ExitCode::BuildFailed
            })
        }
    }
}
