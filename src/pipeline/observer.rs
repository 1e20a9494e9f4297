// src/pipeline/observer.rs

//! Outbound seams of the pipeline: error reporting and reload signals.
//!
//! The pipeline never decides *how* a failure is surfaced or *how* browsers
//! are told to reload; it calls these traits and moves on.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::pipeline::stage::StageError;
use crate::pipeline::BuildReport;

/// Receives per-file diagnostics from a pipeline run.
pub trait BuildObserver: Send + Sync {
    /// A file's stage chain failed; the file was not written.
    fn file_failed(&self, task: &str, source: &Path, error: &StageError);

    /// A stage reported a non-fatal finding; the file was still written.
    fn file_warning(&self, _task: &str, _source: &Path, _stage: &str, _message: &str) {}

    /// Called once per run after all files were processed.
    fn task_finished(&self, _report: &BuildReport) {}
}

/// Default observer: structured log events plus a one-line console report
/// per failure, so errors stay visible when logs are filtered.
#[derive(Debug, Clone, Default)]
pub struct LogObserver;

impl BuildObserver for LogObserver {
    fn file_failed(&self, task: &str, source: &Path, err: &StageError) {
        error!(
            task = %task,
            file = %source.display(),
            stage = %err.stage,
            line = ?err.line,
            "{}",
            err.message
        );
        eprintln!(
            "[sitepipe] Error running {} ({}): {}: {}",
            err.stage,
            task,
            source.display(),
            err
        );
    }

    fn file_warning(&self, task: &str, source: &Path, stage: &str, message: &str) {
        warn!(task = %task, file = %source.display(), stage = %stage, "{message}");
    }

    fn task_finished(&self, report: &BuildReport) {
        info!(
            task = %report.task,
            matched = report.matched,
            written = report.written.len(),
            unchanged = report.unchanged,
            failed = report.failures.len(),
            "task finished"
        );
    }
}

/// What a browser should reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadSignal {
    /// Absolute paths of outputs that changed.
    Paths(Vec<PathBuf>),
    /// Reload everything.
    All,
}

impl ReloadSignal {
    /// True if a client serving `root` should act on this signal.
    pub fn concerns(&self, root: &Path) -> bool {
        match self {
            ReloadSignal::All => true,
            ReloadSignal::Paths(paths) => paths.iter().any(|p| p.starts_with(root)),
        }
    }
}

/// Destination for reload signals (the dev server hub in production).
pub trait ReloadSink: Send + Sync {
    fn reload(&self, signal: ReloadSignal);
}

/// Sink that drops every signal (used with `--once`).
#[derive(Debug, Clone, Default)]
pub struct NoReload;

impl ReloadSink for NoReload {
    fn reload(&self, _signal: ReloadSignal) {}
}
