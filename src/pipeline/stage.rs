// src/pipeline/stage.rs

//! The uniform stage adapter contract.
//!
//! Every transform step, built-in or external, implements [`Stage`]: it takes
//! a file (relative output path + bytes) and returns the transformed file or
//! a structured [`StageError`]. The pipeline iterates the chain explicitly
//! and never inspects what a stage does internally.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::model::{StageConfig, StageKind};
use crate::fs::FileSystem;
use crate::pipeline::observer::BuildObserver;
use crate::pipeline::stages;
use crate::types::BuildMode;

/// A file travelling through a stage chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAsset {
    /// Output path relative to the task's destination directory.
    pub rel_path: PathBuf,
    pub contents: Vec<u8>,
}

impl FileAsset {
    pub fn new(rel_path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            rel_path: rel_path.into(),
            contents: contents.into(),
        }
    }

    /// Borrow the contents as UTF-8, failing on behalf of `stage` otherwise.
    pub fn text(&self, stage: &str) -> Result<&str, StageError> {
        std::str::from_utf8(&self.contents)
            .map_err(|e| StageError::new(stage, format!("file is not valid UTF-8: {e}")))
    }

    pub fn with_text(self, text: String) -> Self {
        Self {
            rel_path: self.rel_path,
            contents: text.into_bytes(),
        }
    }
}

/// Structured description of a stage failure for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub stage: String,
    pub message: String,
    pub line: Option<usize>,
}

impl StageError {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)?;
        if let Some(line) = self.line {
            write!(f, " (line {line})")?;
        }
        Ok(())
    }
}

impl std::error::Error for StageError {}

/// What a stage can see besides the file itself.
pub struct StageContext<'a> {
    pub fs: &'a dyn FileSystem,
    pub project_root: &'a Path,
    /// Absolute path of the source file being processed.
    pub source_path: &'a Path,
    pub mode: BuildMode,
    pub task: &'a str,
    pub(crate) observer: &'a dyn BuildObserver,
}

impl StageContext<'_> {
    /// Report a non-fatal finding for the current file.
    pub fn warn(&self, stage: &str, message: &str) {
        self.observer
            .file_warning(self.task, self.source_path, stage, message);
    }
}

/// One transform step.
pub trait Stage: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn apply(&self, file: FileAsset, ctx: &StageContext<'_>) -> Result<FileAsset, StageError>;
}

/// A stage plus its build-mode gate.
#[derive(Debug)]
pub struct GatedStage {
    stage: Box<dyn Stage>,
    only: Option<BuildMode>,
}

impl GatedStage {
    pub fn new(stage: Box<dyn Stage>, only: Option<BuildMode>) -> Self {
        Self { stage, only }
    }

    pub fn always(stage: impl Stage + 'static) -> Self {
        Self::new(Box::new(stage), None)
    }

    pub fn only_in(stage: impl Stage + 'static, mode: BuildMode) -> Self {
        Self::new(Box::new(stage), Some(mode))
    }

    pub fn name(&self) -> &str {
        self.stage.name()
    }

    pub fn only(&self) -> Option<BuildMode> {
        self.only
    }

    pub fn is_active(&self, mode: BuildMode) -> bool {
        mode.allows(self.only)
    }

    pub fn stage(&self) -> &dyn Stage {
        self.stage.as_ref()
    }
}

/// Instantiate the built-in adapter for a configured stage.
pub fn build_stage(cfg: &StageConfig) -> GatedStage {
    let stage: Box<dyn Stage> = match &cfg.kind {
        StageKind::Include { basepath } => {
            Box::new(stages::IncludeStage::new(basepath.as_deref().map(PathBuf::from)))
        }
        StageKind::Inject { before, text } => {
            Box::new(stages::InjectStage::new(before.clone(), text.clone()))
        }
        StageKind::MinifyJs => Box::new(stages::MinifyJsStage),
        StageKind::MinifyCss => Box::new(stages::MinifyCssStage),
        StageKind::LintJs { strict } => Box::new(stages::LintJsStage::new(*strict)),
        StageKind::Rename { extension } => Box::new(stages::RenameStage::new(extension.clone())),
        StageKind::Command { cmd, extension } => {
            Box::new(stages::CommandStage::new(cmd.clone(), extension.clone()))
        }
    };
    GatedStage::new(stage, cfg.only)
}
