// src/pipeline/stages/text.rs

//! Small content and path rewrites.

use crate::pipeline::stage::{FileAsset, Stage, StageContext, StageError};

/// Inserts `text` immediately before the first occurrence of `before`.
/// Files without the marker pass through unchanged.
#[derive(Debug, Clone)]
pub struct InjectStage {
    before: String,
    text: String,
}

impl InjectStage {
    pub fn new(before: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            text: text.into(),
        }
    }
}

impl Stage for InjectStage {
    fn name(&self) -> &str {
        "inject"
    }

    fn apply(&self, file: FileAsset, _ctx: &StageContext<'_>) -> Result<FileAsset, StageError> {
        let content = file.text(self.name())?;
        let Some(at) = content.find(&self.before) else {
            return Ok(file);
        };

        let mut out = String::with_capacity(content.len() + self.text.len());
        out.push_str(&content[..at]);
        out.push_str(&self.text);
        out.push_str(&content[at..]);
        Ok(file.with_text(out))
    }
}

/// Replaces the output file's extension.
#[derive(Debug, Clone)]
pub struct RenameStage {
    extension: String,
}

impl RenameStage {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }
}

impl Stage for RenameStage {
    fn name(&self) -> &str {
        "rename"
    }

    fn apply(&self, mut file: FileAsset, _ctx: &StageContext<'_>) -> Result<FileAsset, StageError> {
        file.rel_path
            .set_extension(self.extension.trim_start_matches('.'));
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::pipeline::observer::LogObserver;
    use crate::types::BuildMode;

    fn apply(stage: &dyn Stage, file: FileAsset) -> FileAsset {
        let fs = MockFileSystem::new();
        let ctx = StageContext {
            fs: &fs,
            project_root: Path::new("/site"),
            source_path: Path::new("/site/app/index.html"),
            mode: BuildMode::Production,
            task: "html:build",
            observer: &LogObserver,
        };
        stage.apply(file, &ctx).unwrap()
    }

    #[test]
    fn inject_goes_before_first_marker() {
        let stage = InjectStage::new("</body", "<script src=\"test.js\"></script>\n");
        let out = apply(&stage, FileAsset::new("index.html", "<body>x</body></body>"));
        assert_eq!(
            out.contents,
            b"<body>x<script src=\"test.js\"></script>\n</body></body>"
        );
    }

    #[test]
    fn inject_without_marker_is_a_pass_through() {
        let stage = InjectStage::new("</body", "<script/>");
        let out = apply(&stage, FileAsset::new("partial.html", "<div/>"));
        assert_eq!(out.contents, b"<div/>");
    }

    #[test]
    fn rename_replaces_extension() {
        let out = apply(&RenameStage::new(".css"), FileAsset::new("theme/main.scss", "a"));
        assert_eq!(out.rel_path, Path::new("theme/main.css"));
    }
}
