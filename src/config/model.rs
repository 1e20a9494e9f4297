// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::{BuildMode, TerminalAction};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// mode = "production"
/// source_root = "app"
///
/// [output]
/// development = "builds/development"
/// production = "builds/public"
///
/// [server]
/// port = 8001
///
/// [[task]]
/// name = "js:build"
/// src = ["app/js/*.js"]
/// dest = "js"
/// stages = [{ kind = "minify_js", only = "production" }]
///
/// [[task]]
/// name = "build"
/// after = ["js:build"]
/// action = "serve"
/// ```
///
/// Tasks are an array of tables so that declaration order is preserved; the
/// task graph uses it to break ties when planning.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub output: OutputSection,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub task: Vec<TaskConfig>,

    /// Extra watch bindings from `[[watch]]`.
    #[serde(default)]
    pub watch: Vec<WatchBindingConfig>,
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see
/// `config::validate`), so holders can rely on the invariants checked there.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    output: OutputSection,
    server: ServerSection,
    task: Vec<TaskConfig>,
    watch: Vec<WatchBindingConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            output: raw.output,
            server: raw.server,
            task: raw.task,
            watch: raw.watch,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn output_section(&self) -> &OutputSection {
        &self.output
    }

    pub fn server_section(&self) -> &ServerSection {
        &self.server
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> &[TaskConfig] {
        &self.task
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.task.iter().find(|t| t.name == name)
    }

    pub fn watch_bindings(&self) -> &[WatchBindingConfig] {
        &self.watch
    }

    /// Output root for the given mode, resolved against `project_root`.
    pub fn output_root(&self, project_root: &Path, mode: BuildMode) -> PathBuf {
        project_root.join(self.output.dir_for(mode))
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Build mode used unless `--mode` overrides it.
    #[serde(default)]
    pub mode: BuildMode,

    /// Directory holding the sources. Startup fails if it does not exist.
    #[serde(default = "default_source_root")]
    pub source_root: String,

    /// Task run by the `build` command when `--task` is not given.
    #[serde(default = "default_task_name")]
    pub default_task: String,

    /// Window in which filesystem events are coalesced into one trigger.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Skip watch triggers when the changed file's content digest is the
    /// same as last observed.
    #[serde(default)]
    pub use_hash: bool,
}

fn default_source_root() -> String {
    "app".to_string()
}

fn default_task_name() -> String {
    "build".to_string()
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            mode: BuildMode::default(),
            source_root: default_source_root(),
            default_task: default_task_name(),
            debounce_ms: default_debounce_ms(),
            use_hash: false,
        }
    }
}

/// `[output]` section: one output root per build mode.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_development_dir")]
    pub development: String,

    #[serde(default = "default_production_dir")]
    pub production: String,
}

fn default_development_dir() -> String {
    "builds/development".to_string()
}

fn default_production_dir() -> String {
    "builds/public".to_string()
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            development: default_development_dir(),
            production: default_production_dir(),
        }
    }
}

impl OutputSection {
    pub fn dir_for(&self, mode: BuildMode) -> &str {
        match mode {
            BuildMode::Development => &self.development,
            BuildMode::Production => &self.production,
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    /// Port serving the active mode's output root.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Additional roots served on their own ports (`[[server.extra]]`).
    #[serde(default)]
    pub extra: Vec<ExtraServerConfig>,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8001
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            extra: Vec::new(),
        }
    }
}

/// `[[server.extra]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtraServerConfig {
    /// Directory to serve, relative to the config file.
    pub root: String,
    pub port: u16,
}

/// `[[task]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub name: String,

    /// Source glob patterns. Empty for aggregate tasks.
    #[serde(default)]
    pub src: Vec<String>,

    /// Patterns removed from the `src` match.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Explicit glob base; defaults to the literal prefix of each pattern.
    #[serde(default)]
    pub base: Option<String>,

    /// Destination directory relative to the output root.
    #[serde(default)]
    pub dest: String,

    /// Ordered transform chain.
    #[serde(default)]
    pub stages: Vec<StageConfig>,

    /// Dependency list: this task runs after all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Patterns that re-trigger this task. `None` means "same as `src`".
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// Only run the pipeline in this build mode.
    #[serde(default)]
    pub only: Option<BuildMode>,

    /// Terminal action run after the pipeline.
    #[serde(default)]
    pub action: Option<TerminalAction>,
}

impl TaskConfig {
    /// True if this task has a file pipeline (as opposed to a pure aggregate).
    pub fn has_pipeline(&self) -> bool {
        !self.src.is_empty()
    }

    /// Effective patterns that re-trigger this task on change.
    pub fn effective_watch(&self) -> &[String] {
        match &self.watch {
            Some(list) => list,
            None => &self.src,
        }
    }
}

/// One entry of a task's `stages = [...]` list.
///
/// ```toml
/// stages = [
///   { kind = "inject", before = "</body", text = "<script src=\"x.js\"></script>", only = "production" },
///   { kind = "include", basepath = "app/_sections" },
/// ]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    #[serde(flatten)]
    pub kind: StageKind,

    /// Only apply this stage in the given build mode.
    #[serde(default)]
    pub only: Option<BuildMode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageKind {
    Include {
        #[serde(default)]
        basepath: Option<String>,
    },
    Inject {
        before: String,
        text: String,
    },
    MinifyJs,
    MinifyCss,
    LintJs {
        #[serde(default)]
        strict: bool,
    },
    Rename {
        extension: String,
    },
    Command {
        cmd: String,
        #[serde(default)]
        extension: Option<String>,
    },
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Include { .. } => "include",
            StageKind::Inject { .. } => "inject",
            StageKind::MinifyJs => "minify_js",
            StageKind::MinifyCss => "minify_css",
            StageKind::LintJs { .. } => "lint_js",
            StageKind::Rename { .. } => "rename",
            StageKind::Command { .. } => "command",
        }
    }
}

/// `[[watch]]` entry: extra patterns bound to one or more tasks.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchBindingConfig {
    pub patterns: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    pub tasks: Vec<String>,
}
