// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod types;
pub mod watch;

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch as stop_watch};
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::{load_and_validate, project_root_for};
use crate::config::model::ConfigFile;
use crate::dag::{TaskGraph, TaskRunner};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, TaskName};
use crate::errors::SitepipeError;
use crate::exec::PipelineExecutor;
use crate::fs::{FileSystem, RealFileSystem};
use crate::pipeline::{Pipeline, PipelineTask};
use crate::server::{DevServerHub, ReloadRelay, ServerSpec};
use crate::types::{BuildMode, TerminalAction};
use crate::watch::{build_watch_bindings, spawn_watcher, WatchDispatcher};

/// What a registered task does once its dependencies are done.
#[derive(Debug, Clone, Default)]
pub struct TaskAction {
    pub pipeline: Option<Arc<PipelineTask>>,
    pub terminal: Option<TerminalAction>,
}

/// Everything derived from a validated config that the build needs.
#[derive(Debug)]
pub struct Project {
    pub config: ConfigFile,
    pub root: PathBuf,
    pub mode: BuildMode,
    pub output_root: PathBuf,
    pub graph: TaskGraph<TaskAction>,
}

impl Project {
    /// Build the task graph from a validated config.
    ///
    /// Fails if the source root is missing.
    pub fn from_config(config: ConfigFile, root: PathBuf, mode: BuildMode) -> crate::errors::Result<Self> {
        let source_root = root.join(&config.config_section().source_root);
        if !source_root.is_dir() {
            return Err(SitepipeError::MissingSourceDir(source_root));
        }

        let mut graph = TaskGraph::new();
        for task in config.tasks() {
            let pipeline = if task.has_pipeline() {
                Some(Arc::new(PipelineTask::from_config(task)?))
            } else {
                None
            };
            graph.register(
                task.name.as_str(),
                task.after.iter().cloned(),
                TaskAction {
                    pipeline,
                    terminal: task.action,
                },
            )?;
        }
        graph.validate()?;

        let output_root = config.output_root(&root, mode);
        Ok(Self {
            config,
            root,
            mode,
            output_root,
            graph,
        })
    }

    /// Pipelines by task name, for the rebuild executor.
    pub fn pipelines(&self) -> HashMap<TaskName, Arc<PipelineTask>> {
        self.graph
            .tasks()
            .filter_map(|name| {
                let action = self.graph.action(name)?;
                let pipeline = action.pipeline.as_ref()?;
                Some((name.to_string(), Arc::clone(pipeline)))
            })
            .collect()
    }

    /// Dev servers for the `serve` action: the mode's output root, then
    /// every `[[server.extra]]` root.
    pub fn server_specs(&self) -> Vec<ServerSpec> {
        let server = self.config.server_section();
        let mut specs = vec![ServerSpec::new(&self.output_root, &server.host, server.port)];
        specs.extend(
            server
                .extra
                .iter()
                .map(|extra| ServerSpec::new(self.root.join(&extra.root), &server.host, extra.port)),
        );
        specs
    }
}

/// Runs the initial plan: pipelines on the blocking pool, then terminal
/// actions.
struct BuildRunner {
    pipeline: Arc<Pipeline>,
    servers: Vec<ServerSpec>,
    serve_enabled: bool,
    hub: Option<Arc<DevServerHub>>,
    stop: stop_watch::Receiver<bool>,
}

impl TaskRunner<TaskAction> for BuildRunner {
    fn run_task<'a>(
        &'a mut self,
        name: &'a str,
        action: &'a TaskAction,
    ) -> Pin<Box<dyn Future<Output = crate::errors::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(task) = &action.pipeline {
                let pipeline = Arc::clone(&self.pipeline);
                let task = Arc::clone(task);
                let report = tokio::task::spawn_blocking(move || pipeline.build(&task))
                    .await
                    .map_err(|e| SitepipeError::Other(anyhow::anyhow!("task '{name}' panicked: {e}")))??;
                println!(
                    "[sitepipe] {name}: {} written, {} unchanged, {} failed",
                    report.written.len(),
                    report.unchanged,
                    report.failures.len()
                );
            }

            match action.terminal {
                Some(TerminalAction::Serve) if !self.serve_enabled => {
                    info!(task = %name, "dev server disabled; skipping serve");
                }
                Some(TerminalAction::Serve) if self.hub.is_none() => {
                    self.hub = Some(Arc::new(DevServerHub::start(self.servers.clone())));
                }
                Some(TerminalAction::Serve) => {
                    debug!(task = %name, "dev servers already running");
                }
                None => {}
            }
            Ok(())
        })
    }

    fn should_stop(&self) -> bool {
        *self.stop.borrow()
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - the initial build of the target's dependency closure
/// - dev servers (the `serve` action)
/// - the file watcher and the rebuild runtime
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let mode = args
        .mode
        .map(BuildMode::from)
        .unwrap_or(cfg.config_section().mode);
    let target = args
        .task
        .clone()
        .unwrap_or_else(|| cfg.config_section().default_task.clone());

    let project = Project::from_config(cfg, project_root_for(&config_path), mode)?;
    info!(root = %project.root.display(), %mode, target = %target, "project loaded");

    if args.dry_run {
        print_dry_run(&project, &target)?;
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let relay = Arc::new(ReloadRelay::new());
    let pipeline = Arc::new(
        Pipeline::new(Arc::clone(&fs), &project.root, &project.output_root, mode)
            .with_reload_sink(relay.clone()),
    );

    // Ctrl-C -> graceful shutdown, during the initial build as well: the
    // flag stops the plan between tasks, the event drains the rebuild loop.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let (stop_tx, stop_rx) = stop_watch::channel(false);
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received; finishing in-flight work");
            stop_tx.send_replace(true);
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let mut runner = BuildRunner {
        pipeline: Arc::clone(&pipeline),
        servers: project.server_specs(),
        serve_enabled: project.config.server_section().enabled && !args.once,
        hub: None,
        stop: stop_rx.clone(),
    };
    let ran = project.graph.run(&target, &mut runner).await?;
    let hub = runner.hub.take();

    if *stop_rx.borrow() {
        println!("[sitepipe] Stopped after {} task(s)", ran.len());
        if let Some(hub) = hub {
            hub.shutdown().await;
        }
        return Ok(());
    }
    info!(tasks = ran.len(), "initial build finished");

    if args.once {
        return Ok(());
    }

    if let Some(hub) = &hub {
        relay.attach(Arc::clone(hub));
    }

    let section = project.config.config_section();
    let mut dispatcher = WatchDispatcher::new(
        Arc::clone(&fs),
        &project.root,
        &project.output_root,
        build_watch_bindings(&project.config)?,
        section.use_hash,
    );
    if section.use_hash {
        prime_hashes(&project, fs.as_ref(), &mut dispatcher);
    }
    let watcher = watch_or_degrade(
        spawn_watcher(
            dispatcher,
            &project.root,
            Duration::from_millis(section.debounce_ms),
            rt_tx.clone(),
        ),
        hub.is_some(),
    )?;
    match &watcher {
        Some(handle) => println!(
            "[sitepipe] Watching {} director{} for changes (Ctrl-C to stop)",
            handle.dirs().len(),
            if handle.dirs().len() == 1 { "y" } else { "ies" }
        ),
        None => println!("[sitepipe] Serving without rebuilds (Ctrl-C to stop)"),
    }

    let executor = PipelineExecutor::new(pipeline, project.pipelines(), rt_tx);
    let core = CoreRuntime::new(project.graph.tasks().map(str::to_string));
    Runtime::new(core, rt_rx, executor).run().await?;

    drop(watcher);
    if let Some(hub) = hub {
        hub.shutdown().await;
    }
    Ok(())
}

/// A watcher that fails to start is fatal only when nothing else is running;
/// with dev servers up, they keep serving the last build.
fn watch_or_degrade<W>(started: Result<W>, serving: bool) -> Result<Option<W>> {
    match started {
        Ok(watcher) => Ok(Some(watcher)),
        Err(err) if serving => {
            error!(error = %err, "file watcher failed to start; rebuilds disabled");
            eprintln!("[sitepipe] file watcher failed to start: {err:#}");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Record the digest of every current source file so the first no-op save
/// does not trigger a rebuild.
fn prime_hashes(project: &Project, fs: &dyn FileSystem, dispatcher: &mut WatchDispatcher) {
    for pipeline in project.pipelines().values() {
        let sources = pipeline.sources();
        match sources.resolve(fs, &project.root, &project.output_root) {
            Ok(files) => {
                for file in files {
                    dispatcher.prime(&file.abs_path);
                }
            }
            Err(err) => warn!(task = %pipeline.name(), error = %err, "could not prime digests"),
        }
    }
}

/// Print the plan, every task, and every watch binding.
fn print_dry_run(project: &Project, target: &str) -> Result<()> {
    let plan = project.graph.plan(target)?;

    println!("sitepipe dry-run");
    println!("  mode = {}", project.mode);
    println!("  project root = {}", project.root.display());
    println!("  output root = {}", project.output_root.display());
    println!("  plan for '{target}': {}", plan.join(" -> "));
    println!();

    println!("tasks ({}):", project.graph.len());
    for task in project.config.tasks() {
        println!("  - {}", task.name);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if !task.src.is_empty() {
            println!("      src: {:?}", task.src);
            if !task.exclude.is_empty() {
                println!("      exclude: {:?}", task.exclude);
            }
            println!("      dest: {}", relative_display(&project.output_root, &task.dest));
        }
        if let Some(only) = task.only {
            println!("      only: {only}");
        }
        for stage in &task.stages {
            let active = if project.mode.allows(stage.only) { "" } else { " (inactive)" };
            println!("      stage: {}{active}", stage.kind.name());
        }
        if let Some(action) = task.action {
            println!("      action: {action:?}");
        }
    }

    let bindings = build_watch_bindings(&project.config)?;
    println!();
    println!("watch bindings ({}):", bindings.len());
    for binding in &bindings {
        println!(
            "  {:?} -> {:?}",
            binding.pattern_set().patterns(),
            binding.tasks()
        );
    }

    debug!("dry-run complete (nothing built)");
    Ok(())
}

fn relative_display(output_root: &Path, dest: &str) -> String {
    output_root.join(dest).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_failure_is_fatal_without_servers() {
        let started: Result<()> = Err(anyhow::anyhow!("inotify watch limit reached"));
        let err = watch_or_degrade(started, false).unwrap_err();
        assert!(err.to_string().contains("inotify"));
    }

    #[test]
    fn watcher_failure_keeps_servers_running() {
        let started: Result<()> = Err(anyhow::anyhow!("inotify watch limit reached"));
        assert!(watch_or_degrade(started, true).unwrap().is_none());
    }

    #[test]
    fn started_watcher_is_kept() {
        assert_eq!(watch_or_degrade(Ok(7), false).unwrap(), Some(7));
    }
}
