#![allow(dead_code)]

use sitepipe::config::{
    ConfigFile, ConfigSection, OutputSection, RawConfigFile, ServerSection, StageConfig, StageKind,
    TaskConfig, WatchBindingConfig,
};
use sitepipe::errors::Result;
use sitepipe::types::{BuildMode, TerminalAction};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Tasks keep the order they were added in. The default task is `build`
/// unless changed with [`ConfigFileBuilder::default_task`].
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                output: OutputSection::default(),
                server: ServerSection::default(),
                task: Vec::new(),
                watch: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.config.task.push(task);
        self
    }

    pub fn with_watch(mut self, patterns: &[&str], tasks: &[&str]) -> Self {
        self.config.watch.push(WatchBindingConfig {
            patterns: strings(patterns),
            exclude: Vec::new(),
            tasks: strings(tasks),
        });
        self
    }

    pub fn default_task(mut self, name: &str) -> Self {
        self.config.config.default_task = name.to_string();
        self
    }

    pub fn mode(mut self, mode: BuildMode) -> Self {
        self.config.config.mode = mode;
        self
    }

    pub fn use_hash(mut self, val: bool) -> Self {
        self.config.config.use_hash = val;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: TaskConfig {
                name: name.to_string(),
                src: Vec::new(),
                exclude: Vec::new(),
                base: None,
                dest: String::new(),
                stages: Vec::new(),
                after: Vec::new(),
                watch: None,
                only: None,
                action: None,
            },
        }
    }

    pub fn src(mut self, patterns: &[&str]) -> Self {
        self.task.src = strings(patterns);
        self
    }

    pub fn exclude(mut self, patterns: &[&str]) -> Self {
        self.task.exclude = strings(patterns);
        self
    }

    pub fn base(mut self, base: &str) -> Self {
        self.task.base = Some(base.to_string());
        self
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.task.dest = dest.to_string();
        self
    }

    pub fn after(mut self, deps: &[&str]) -> Self {
        self.task.after = strings(deps);
        self
    }

    pub fn watch(mut self, patterns: &[&str]) -> Self {
        self.task.watch = Some(strings(patterns));
        self
    }

    pub fn stage(mut self, kind: StageKind) -> Self {
        self.task.stages.push(StageConfig { kind, only: None });
        self
    }

    pub fn stage_only(mut self, kind: StageKind, mode: BuildMode) -> Self {
        self.task.stages.push(StageConfig {
            kind,
            only: Some(mode),
        });
        self
    }

    pub fn only(mut self, mode: BuildMode) -> Self {
        self.task.only = Some(mode);
        self
    }

    pub fn serve(mut self) -> Self {
        self.task.action = Some(TerminalAction::Serve);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}
