// src/pipeline/stages/include.rs

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::pipeline::stage::{FileAsset, Stage, StageContext, StageError};

/// Nesting limit; deeper chains are almost certainly include cycles.
pub const MAX_INCLUDE_DEPTH: usize = 16;

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@@include\(\s*(?:'([^']+)'|"([^"]+)")\s*\)"#).expect("valid regex")
});

/// Expands `@@include('file')` directives.
///
/// Paths resolve against `basepath` (relative to the project root) when set,
/// otherwise against the directory of the file containing the directive.
#[derive(Debug, Clone, Default)]
pub struct IncludeStage {
    basepath: Option<PathBuf>,
}

impl IncludeStage {
    pub fn new(basepath: Option<PathBuf>) -> Self {
        Self { basepath }
    }
}

impl Stage for IncludeStage {
    fn name(&self) -> &str {
        "include"
    }

    fn apply(&self, file: FileAsset, ctx: &StageContext<'_>) -> Result<FileAsset, StageError> {
        let text = file.text(self.name())?;
        let dir = ctx
            .source_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| ctx.project_root.to_path_buf());

        let expanded = self
            .expand(text, &dir, 0, ctx)
            .map_err(|(line, message)| StageError::new(self.name(), message).at_line(line))?;
        Ok(file.with_text(expanded))
    }
}

impl IncludeStage {
    // Errors carry the line of the outermost directive involved.
    fn expand(
        &self,
        text: &str,
        dir: &Path,
        depth: usize,
        ctx: &StageContext<'_>,
    ) -> Result<String, (usize, String)> {
        if !INCLUDE_RE.is_match(text) {
            return Ok(text.to_string());
        }
        if depth >= MAX_INCLUDE_DEPTH {
            return Err((
                1,
                format!("include depth exceeds {MAX_INCLUDE_DEPTH}; is there a cycle?"),
            ));
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in INCLUDE_RE.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let line = text[..whole.start()].matches('\n').count() + 1;
            let target = include_target(&caps);

            let path = match &self.basepath {
                Some(base) => ctx.project_root.join(base).join(target),
                None => dir.join(target),
            };
            let included = ctx
                .fs
                .read_to_string(&path)
                .map_err(|e| (line, format!("cannot include '{target}': {e:#}")))?;

            let nested_dir = path.parent().unwrap_or(dir);
            let nested = self
                .expand(&included, nested_dir, depth + 1, ctx)
                .map_err(|(_, message)| (line, message))?;

            out.push_str(&text[last..whole.start()]);
            out.push_str(&nested);
            last = whole.end();
        }

        out.push_str(&text[last..]);
        Ok(out)
    }
}

fn include_target<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default()
}
