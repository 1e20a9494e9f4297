// src/config/validate.rs

use std::collections::HashSet;
use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile, StageKind};
use crate::dag::TaskGraph;
use crate::errors::{Result, SitepipeError};
use crate::pipeline::is_contained;
use crate::watch::patterns::compile_glob;

/// Upper bound for `[config].debounce_ms`.
pub const MAX_DEBOUNCE_MS: u64 = 10_000;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SitepipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_server(cfg)?;
    validate_tasks(cfg)?;
    validate_task_graph(cfg)?;
    validate_watch_bindings(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> SitepipeError {
    SitepipeError::ConfigError(msg.into())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(config_error(
            "config must contain at least one [[task]] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.debounce_ms > MAX_DEBOUNCE_MS {
        return Err(config_error(format!(
            "[config].debounce_ms must be <= {MAX_DEBOUNCE_MS} (got {})",
            cfg.config.debounce_ms
        )));
    }

    if !cfg.task.iter().any(|t| t.name == cfg.config.default_task) {
        return Err(config_error(format!(
            "[config].default_task '{}' is not a declared task",
            cfg.config.default_task
        )));
    }

    for (key, dir) in [
        ("development", &cfg.output.development),
        ("production", &cfg.output.production),
    ] {
        if dir.trim().is_empty() {
            return Err(config_error(format!("[output].{key} must not be empty")));
        }
    }

    Ok(())
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    let server = &cfg.server;
    let mut ports = HashSet::new();

    let all_ports = std::iter::once(("[server].port".to_string(), server.port)).chain(
        server
            .extra
            .iter()
            .enumerate()
            .map(|(i, extra)| (format!("[[server.extra]] #{}", i + 1), extra.port)),
    );

    for (label, port) in all_ports {
        if port == 0 {
            return Err(config_error(format!("{label}: port must not be 0")));
        }
        if !ports.insert(port) {
            return Err(config_error(format!(
                "{label}: port {port} is used by more than one server"
            )));
        }
    }

    for (i, extra) in server.extra.iter().enumerate() {
        if extra.root.trim().is_empty() {
            return Err(config_error(format!(
                "[[server.extra]] #{}: root must not be empty",
                i + 1
            )));
        }
    }

    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for task in &cfg.task {
        let name = &task.name;
        if name.trim().is_empty() {
            return Err(config_error("task name must not be empty"));
        }

        if !is_contained(Path::new(&task.dest)) {
            return Err(config_error(format!(
                "task '{name}': dest '{}' must be a relative path without '..'",
                task.dest
            )));
        }

        if !task.has_pipeline() && !task.stages.is_empty() {
            return Err(config_error(format!(
                "task '{name}' declares stages but no `src` patterns"
            )));
        }

        let globs = task
            .src
            .iter()
            .chain(task.exclude.iter())
            .chain(task.watch.iter().flatten());
        for pattern in globs {
            compile_glob(pattern).map_err(|e| config_error(format!("task '{name}': {e:#}")))?;
        }

        for stage in &task.stages {
            match &stage.kind {
                StageKind::Rename { extension } if extension.trim().is_empty() => {
                    return Err(config_error(format!(
                        "task '{name}': rename stage needs a non-empty extension"
                    )));
                }
                StageKind::Command { cmd, .. } if cmd.trim().is_empty() => {
                    return Err(config_error(format!(
                        "task '{name}': command stage needs a non-empty cmd"
                    )));
                }
                StageKind::Inject { before, .. } if before.is_empty() => {
                    return Err(config_error(format!(
                        "task '{name}': inject stage needs a non-empty `before` marker"
                    )));
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Duplicate names, unknown dependencies, self dependencies and cycles are
/// all detected by the task graph itself.
fn validate_task_graph(cfg: &RawConfigFile) -> Result<()> {
    let mut graph: TaskGraph<()> = TaskGraph::new();
    for task in &cfg.task {
        graph.register(task.name.as_str(), task.after.iter().cloned(), ())?;
    }
    graph.validate()
}

fn validate_watch_bindings(cfg: &RawConfigFile) -> Result<()> {
    for (i, entry) in cfg.watch.iter().enumerate() {
        let label = format!("[[watch]] #{}", i + 1);
        if entry.patterns.is_empty() {
            return Err(config_error(format!("{label}: `patterns` must not be empty")));
        }
        if entry.tasks.is_empty() {
            return Err(config_error(format!("{label}: `tasks` must not be empty")));
        }
        for pattern in entry.patterns.iter().chain(entry.exclude.iter()) {
            compile_glob(pattern).map_err(|e| config_error(format!("{label}: {e:#}")))?;
        }
        for task in &entry.tasks {
            if !cfg.task.iter().any(|t| &t.name == task) {
                return Err(config_error(format!(
                    "{label}: unknown task '{task}'"
                )));
            }
        }
    }
    Ok(())
}
