// src/pipeline/sources.rs

//! Resolving a task's source globs to an ordered list of files.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobMatcher, GlobSet};

use crate::fs::FileSystem;
use crate::watch::path_utils::relative_slash;
use crate::watch::patterns::{build_globset, compile_matcher, glob_base};

/// A source file matched by a glob rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub abs_path: PathBuf,
    /// Path relative to the project root, forward slashes.
    pub project_rel: String,
    /// Output path relative to the task destination.
    pub out_rel: PathBuf,
}

/// Compiled source side of a glob rule.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    entries: Vec<SourcePattern>,
    exclude: Option<GlobSet>,
    base: Option<String>,
}

#[derive(Debug, Clone)]
struct SourcePattern {
    matcher: GlobMatcher,
    base: String,
}

impl SourceSpec {
    pub fn new(src: &[String], exclude: &[String], base: Option<&str>) -> Result<Self> {
        let entries = src
            .iter()
            .map(|pattern| {
                Ok(SourcePattern {
                    matcher: compile_matcher(pattern)?,
                    base: glob_base(pattern).to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };

        Ok(Self {
            entries,
            exclude,
            base: base.map(|b| b.trim_end_matches('/').to_string()),
        })
    }

    /// Resolve against `project_root`.
    ///
    /// Nothing under `output_root` is ever a source, so a broad pattern such
    /// as `**/*.html` does not pick up earlier outputs. Files matched by
    /// several patterns are kept once (first pattern wins for the output
    /// path). The result is sorted by project-relative path, so the order
    /// does not depend on directory listing order.
    pub fn resolve(
        &self,
        fs: &dyn FileSystem,
        project_root: &Path,
        output_root: &Path,
    ) -> Result<Vec<SourceFile>> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut files = Vec::new();

        for entry in &self.entries {
            let walk_root = project_root.join(&entry.base);
            if !fs.is_dir(&walk_root) || walk_root.starts_with(output_root) {
                continue;
            }

            for path in walk_files(fs, &walk_root, output_root)? {
                let Some(project_rel) = relative_slash(project_root, &path) else {
                    continue;
                };
                if !entry.matcher.is_match(&project_rel) {
                    continue;
                }
                if let Some(exclude) = &self.exclude {
                    if exclude.is_match(&project_rel) {
                        continue;
                    }
                }
                if !seen.insert(path.clone()) {
                    continue;
                }

                let base = self.base.as_deref().unwrap_or(&entry.base);
                let out_rel = strip_base(&project_rel, base);
                files.push(SourceFile {
                    abs_path: path,
                    project_rel,
                    out_rel,
                });
            }
        }

        files.sort_by(|a, b| a.project_rel.cmp(&b.project_rel));
        Ok(files)
    }
}

/// Every regular file below `dir`, recursively, pruning `skip`.
fn walk_files(fs: &dyn FileSystem, dir: &Path, skip: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = fs
            .read_dir(&dir)
            .with_context(|| format!("listing source directory {:?}", dir))?;
        for path in entries {
            if path.starts_with(skip) {
                continue;
            }
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

fn strip_base(project_rel: &str, base: &str) -> PathBuf {
    if base.is_empty() {
        return PathBuf::from(project_rel);
    }
    match project_rel.strip_prefix(base) {
        Some(rest) => PathBuf::from(rest.trim_start_matches('/')),
        // Outside the explicit base: keep only the file name.
        None => Path::new(project_rel)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(project_rel)),
    }
}

/// True if `path` is relative and made of plain names only (no `..`, no
/// root, no drive prefix), i.e. joining it to a directory stays inside it.
pub fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    const OUT: &str = "/site/builds";

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|p| p.to_string()).collect()
    }

    fn fixture() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("/site/app/scss/theme/dark.scss", "b".as_bytes());
        fs.add_file("/site/app/scss/style.scss", "a".as_bytes());
        fs.add_file("/site/app/scss/_vars.scss", "v".as_bytes());
        fs.add_file("/site/app/index.html", "i".as_bytes());
        fs.add_file("/site/app/about.html", "x".as_bytes());
        fs.add_file("/site/app/_sections/head.htm", "h".as_bytes());
        fs
    }

    #[test]
    fn resolves_sorted_with_paths_relative_to_glob_base() {
        let fs = fixture();
        let spec = SourceSpec::new(&s(&["app/scss/**/*.scss"]), &s(&["app/scss/**/_*.scss"]), None).unwrap();

        let files = spec.resolve(&fs, Path::new("/site"), Path::new(OUT)).unwrap();
        let rels: Vec<_> = files.iter().map(|f| f.project_rel.as_str()).collect();
        assert_eq!(rels, vec!["app/scss/style.scss", "app/scss/theme/dark.scss"]);
        assert_eq!(files[1].out_rel, PathBuf::from("theme/dark.scss"));
    }

    #[test]
    fn explicit_base_controls_output_path() {
        let fs = fixture();
        let spec = SourceSpec::new(&s(&["app/scss/theme/*.scss"]), &[], Some("app")).unwrap();
        let files = spec.resolve(&fs, Path::new("/site"), Path::new(OUT)).unwrap();
        assert_eq!(files[0].out_rel, PathBuf::from("scss/theme/dark.scss"));
    }

    #[test]
    fn overlapping_patterns_yield_each_file_once() {
        let fs = fixture();
        let spec = SourceSpec::new(&s(&["app/*.html", "app/index.html"]), &[], None).unwrap();
        let files = spec.resolve(&fs, Path::new("/site"), Path::new(OUT)).unwrap();
        let rels: Vec<_> = files.iter().map(|f| f.project_rel.as_str()).collect();
        assert_eq!(rels, vec!["app/about.html", "app/index.html"]);
    }

    #[test]
    fn missing_base_directory_matches_nothing() {
        let fs = fixture();
        let spec = SourceSpec::new(&s(&["app/options/**/*.*"]), &[], None).unwrap();
        assert!(spec.resolve(&fs, Path::new("/site"), Path::new(OUT)).unwrap().is_empty());
    }

    #[test]
    fn output_root_is_never_a_source() {
        let fs = fixture();
        fs.add_file("/site/builds/index.html", "old".as_bytes());
        fs.add_file("/site/builds/app/about.html", "old".as_bytes());

        let spec = SourceSpec::new(&s(&["**/*.html"]), &[], None).unwrap();
        let files = spec.resolve(&fs, Path::new("/site"), Path::new(OUT)).unwrap();
        let rels: Vec<_> = files.iter().map(|f| f.project_rel.as_str()).collect();
        assert_eq!(rels, vec!["app/about.html", "app/index.html"]);

        let spec = SourceSpec::new(&s(&["builds/**/*.html"]), &[], None).unwrap();
        assert!(spec.resolve(&fs, Path::new("/site"), Path::new(OUT)).unwrap().is_empty());
    }

    #[test]
    fn containment_rejects_parent_and_absolute_paths() {
        assert!(is_contained(Path::new("css/theme.css")));
        assert!(is_contained(Path::new("")));
        assert!(!is_contained(Path::new("../escape.css")));
        assert!(!is_contained(Path::new("/etc/passwd")));
    }
}
