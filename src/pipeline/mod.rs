// src/pipeline/mod.rs

//! File transform pipeline.
//!
//! For one task: resolve the source globs, push each file through the active
//! stages, write the result under the mode's output root, and emit one
//! batched reload signal for whatever actually changed on disk.

pub mod observer;
pub mod sources;
pub mod stage;
pub mod stages;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use tracing::{debug, info};

use crate::config::model::TaskConfig;
use crate::engine::TaskName;
use crate::errors::{Result, SitepipeError};
use crate::fs::FileSystem;
use crate::types::BuildMode;
use crate::watch::cache::FileCache;
use crate::watch::hash::hash_bytes;

pub use observer::{BuildObserver, LogObserver, NoReload, ReloadSignal, ReloadSink};
pub use sources::{is_contained, SourceFile, SourceSpec};
pub use stage::{build_stage, FileAsset, GatedStage, Stage, StageContext, StageError};

/// A task's file pipeline: glob rule plus ordered stage chain.
#[derive(Debug)]
pub struct PipelineTask {
    name: TaskName,
    sources: SourceSpec,
    dest: PathBuf,
    stages: Vec<GatedStage>,
    only: Option<BuildMode>,
}

impl PipelineTask {
    pub fn new(
        name: impl Into<TaskName>,
        sources: SourceSpec,
        dest: impl Into<PathBuf>,
        stages: Vec<GatedStage>,
    ) -> Result<Self> {
        let name = name.into();
        let dest = dest.into();
        if !is_contained(&dest) {
            return Err(SitepipeError::ConfigError(format!(
                "task '{name}': dest {:?} must be a relative path inside the output root",
                dest
            )));
        }
        Ok(Self {
            name,
            sources,
            dest,
            stages,
            only: None,
        })
    }

    /// Gate the whole pipeline to one build mode.
    pub fn only_in(mut self, mode: Option<BuildMode>) -> Self {
        self.only = mode;
        self
    }

    pub fn from_config(cfg: &TaskConfig) -> Result<Self> {
        let sources = SourceSpec::new(&cfg.src, &cfg.exclude, cfg.base.as_deref())
            .with_context(|| format!("compiling source globs for task {}", cfg.name))?;
        let stages = cfg.stages.iter().map(build_stage).collect();
        Ok(Self::new(cfg.name.clone(), sources, &cfg.dest, stages)?.only_in(cfg.only))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> &SourceSpec {
        &self.sources
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn stages(&self) -> &[GatedStage] {
        &self.stages
    }

    pub fn only(&self) -> Option<BuildMode> {
        self.only
    }
}

/// A file whose stage chain (or write) failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub source: PathBuf,
    pub error: StageError,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub task: TaskName,
    /// Number of source files matched.
    pub matched: usize,
    /// Absolute paths of outputs written in this run.
    pub written: Vec<PathBuf>,
    /// Outputs whose bytes were already on disk.
    pub unchanged: usize,
    pub failures: Vec<FileFailure>,
    /// The task is gated to the other build mode and did nothing.
    pub skipped: bool,
}

impl BuildReport {
    fn new(task: &str) -> Self {
        Self {
            task: task.to_string(),
            ..Self::default()
        }
    }
}

/// Runs pipeline tasks for one build mode against one output root.
///
/// Shared by every run for the lifetime of the process; the output digest
/// cache is what lets an identical rebuild skip its writes.
pub struct Pipeline {
    fs: Arc<dyn FileSystem>,
    project_root: PathBuf,
    output_root: PathBuf,
    mode: BuildMode,
    observer: Arc<dyn BuildObserver>,
    reload: Arc<dyn ReloadSink>,
    outputs: Mutex<FileCache>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("project_root", &self.project_root)
            .field("output_root", &self.output_root)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        project_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        mode: BuildMode,
    ) -> Self {
        Self {
            fs,
            project_root: project_root.into(),
            output_root: output_root.into(),
            mode,
            observer: Arc::new(LogObserver),
            reload: Arc::new(NoReload),
            outputs: Mutex::new(FileCache::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BuildObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_reload_sink(mut self, reload: Arc<dyn ReloadSink>) -> Self {
        self.reload = reload;
        self
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    fn outputs(&self) -> MutexGuard<'_, FileCache> {
        self.outputs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run one task's pipeline.
    ///
    /// Only glob resolution errors are returned; anything that goes wrong
    /// with an individual file is reported through the observer and recorded
    /// in the report.
    pub fn build(&self, task: &PipelineTask) -> Result<BuildReport> {
        let mut report = BuildReport::new(task.name());

        if !self.mode.allows(task.only()) {
            debug!(task = %task.name(), mode = %self.mode, "task gated to another mode; skipping");
            report.skipped = true;
            self.observer.task_finished(&report);
            return Ok(report);
        }

        let files = task
            .sources
            .resolve(self.fs.as_ref(), &self.project_root, &self.output_root)
            .with_context(|| format!("resolving sources for task {}", task.name()))?;
        report.matched = files.len();
        debug!(task = %task.name(), matched = files.len(), "resolved sources");

        let dest_root = self.output_root.join(task.dest());

        for source in &files {
            match self.process_file(task, source, &dest_root) {
                Ok(Some(written)) => report.written.push(written),
                Ok(None) => report.unchanged += 1,
                Err(error) => {
                    self.observer.file_failed(task.name(), &source.abs_path, &error);
                    report.failures.push(FileFailure {
                        source: source.abs_path.clone(),
                        error,
                    });
                }
            }
        }

        if !report.written.is_empty() {
            info!(
                task = %task.name(),
                changed = report.written.len(),
                "outputs changed; signalling reload"
            );
            self.reload.reload(ReloadSignal::Paths(report.written.clone()));
        }

        self.observer.task_finished(&report);
        Ok(report)
    }

    /// Returns the output path if it was written, `None` if it was unchanged.
    fn process_file(
        &self,
        task: &PipelineTask,
        source: &SourceFile,
        dest_root: &Path,
    ) -> std::result::Result<Option<PathBuf>, StageError> {
        let contents = self
            .fs
            .read(&source.abs_path)
            .map_err(|e| StageError::new("read", format!("{e:#}")))?;

        let ctx = StageContext {
            fs: self.fs.as_ref(),
            project_root: &self.project_root,
            source_path: &source.abs_path,
            mode: self.mode,
            task: task.name(),
            observer: self.observer.as_ref(),
        };

        let mut file = FileAsset::new(source.out_rel.clone(), contents);
        for stage in task.stages().iter().filter(|s| s.is_active(self.mode)) {
            file = stage.stage().apply(file, &ctx)?;
        }

        if !is_contained(&file.rel_path) {
            return Err(StageError::new(
                "write",
                format!(
                    "output path {:?} escapes the destination directory",
                    file.rel_path
                ),
            ));
        }

        let out_path = dest_root.join(&file.rel_path);
        let digest = hash_bytes(&file.contents);

        {
            let mut outputs = self.outputs();
            // Always re-read what is on disk: an output deleted or edited
            // behind our back must be written again.
            outputs.refresh(self.fs.as_ref(), &out_path);
            if outputs.get(&out_path) == Some(digest.as_str()) {
                debug!(output = %out_path.display(), "output unchanged; not rewriting");
                return Ok(None);
            }
        }

        self.fs
            .write(&out_path, &file.contents)
            .map_err(|e| StageError::new("write", format!("{e:#}")))?;
        self.outputs().insert(&out_path, digest);

        debug!(output = %out_path.display(), "wrote output");
        Ok(Some(out_path))
    }
}
