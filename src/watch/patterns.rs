// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::config::model::ConfigFile;
use crate::engine::TaskName;

/// Characters that make a path component a wildcard.
const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Compile one pattern.
///
/// `*` never crosses a `/` (only `**` does), so `app/*.html` does not match
/// `app/partials/x.html`.
pub fn compile_glob(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

pub fn compile_matcher(pattern: &str) -> Result<GlobMatcher> {
    Ok(compile_glob(pattern)?.compile_matcher())
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_glob(pat)?);
    }
    Ok(builder.build()?)
}

/// Literal directory prefix of a pattern: every leading component that
/// contains no wildcard, excluding the last component.
///
/// - `app/scss/**/*.scss` -> `app/scss`
/// - `app/*.html` -> `app`
/// - `index.html` -> `` (project root)
pub fn glob_base(pattern: &str) -> &str {
    let trimmed = pattern.trim_start_matches("./");
    let mut end = 0;
    let mut offset = 0;
    let components: Vec<&str> = trimmed.split('/').collect();

    for (i, comp) in components.iter().enumerate() {
        if i + 1 == components.len() || comp.contains(GLOB_META) {
            break;
        }
        offset += comp.len();
        end = offset;
        offset += 1; // the '/'
    }

    &trimmed[..end]
}

/// Include patterns minus exclude patterns, evaluated against paths relative
/// to the project root with forward slashes.
#[derive(Clone)]
pub struct PatternSet {
    patterns: Vec<String>,
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternSet")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl PatternSet {
    pub fn new(patterns: &[String], exclude: &[String]) -> Result<Self> {
        let include = build_globset(patterns)?;
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };
        Ok(Self {
            patterns: patterns.to_vec(),
            include,
            exclude,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Literal base directories of all include patterns.
    pub fn bases(&self) -> Vec<&str> {
        let mut bases: Vec<&str> = self.patterns.iter().map(|p| glob_base(p)).collect();
        bases.sort_unstable();
        bases.dedup();
        bases
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Association between a set of patterns and the tasks they re-trigger.
///
/// Bindings are built once at startup and never change afterwards.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    patterns: PatternSet,
    tasks: Vec<TaskName>,
}

impl WatchBinding {
    pub fn new(patterns: PatternSet, tasks: Vec<TaskName>) -> Self {
        Self { patterns, tasks }
    }

    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    pub fn pattern_set(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.patterns.matches(rel_path)
    }
}

/// Build every watch binding from a validated config:
///
/// - each pipeline task binds its effective `watch` list (default: `src`,
///   minus the task's `exclude`) to itself;
/// - each `[[watch]]` entry binds its patterns to its task list.
pub fn build_watch_bindings(cfg: &ConfigFile) -> Result<Vec<WatchBinding>> {
    let mut bindings = Vec::new();

    for task in cfg.tasks() {
        let patterns = task.effective_watch();
        if patterns.is_empty() {
            continue;
        }
        // Excludes only narrow the implicit binding; an explicit `watch` list
        // is taken as written.
        let exclude: &[String] = if task.watch.is_none() {
            &task.exclude
        } else {
            &[]
        };
        let set = PatternSet::new(patterns, exclude)
            .with_context(|| format!("building watch globset for task {}", task.name))?;
        bindings.push(WatchBinding::new(set, vec![task.name.clone()]));
    }

    for (i, entry) in cfg.watch_bindings().iter().enumerate() {
        let set = PatternSet::new(&entry.patterns, &entry.exclude)
            .with_context(|| format!("building globset for [[watch]] entry #{}", i + 1))?;
        bindings.push(WatchBinding::new(set, entry.tasks.clone()));
    }

    Ok(bindings)
}

/// Tasks bound to `rel_path`, de-duplicated, in binding order.
pub fn tasks_for_path<'b>(bindings: &'b [WatchBinding], rel_path: &str) -> Vec<&'b str> {
    let mut out: Vec<&str> = Vec::new();
    for binding in bindings.iter().filter(|b| b.matches(rel_path)) {
        for task in binding.tasks() {
            if !out.contains(&task.as_str()) {
                out.push(task);
            }
        }
    }
    out
}
