// src/pipeline/stages/command.rs

use std::future::Future;
use std::io;
use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::runtime::{Builder, Handle};
use tracing::debug;

use crate::pipeline::stage::{FileAsset, Stage, StageContext, StageError};

/// Pipes the file through an external program.
///
/// The command runs through the platform shell in the project root, with
/// the file content on stdin. Its stdout replaces the content. A non-zero
/// exit fails the file with the program's stderr as message.
///
/// The child also sees `SITEPIPE_FILE` (absolute source path) and
/// `SITEPIPE_MODE` in its environment.
///
/// Stages are synchronous and run on the blocking pool; the child is driven
/// by the surrounding Tokio runtime, or a private one outside of it.
#[derive(Debug, Clone)]
pub struct CommandStage {
    cmd: String,
    extension: Option<String>,
}

impl CommandStage {
    pub fn new(cmd: impl Into<String>, extension: Option<String>) -> Self {
        Self {
            cmd: cmd.into(),
            extension,
        }
    }

    fn shell(&self) -> Command {
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        }
    }

    async fn pipe(&self, input: &[u8], ctx: &StageContext<'_>) -> io::Result<Output> {
        let mut cmd = self.shell();
        cmd.current_dir(ctx.project_root)
            .env("SITEPIPE_FILE", ctx.source_path)
            .env("SITEPIPE_MODE", ctx.mode.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take();

        // Write and collect at the same time: a child that prints before it
        // has read everything must not block on a full pipe.
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(input).await {
                // The child may exit without reading everything.
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        fed?;
        Ok(output)
    }
}

fn block_on<F: Future>(fut: F) -> io::Result<F::Output> {
    match Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(fut)),
        Err(_) => Ok(Builder::new_current_thread().enable_all().build()?.block_on(fut)),
    }
}

impl Stage for CommandStage {
    fn name(&self) -> &str {
        "command"
    }

    fn apply(&self, file: FileAsset, ctx: &StageContext<'_>) -> Result<FileAsset, StageError> {
        debug!(cmd = %self.cmd, file = %ctx.source_path.display(), "running command stage");

        let output = block_on(self.pipe(&file.contents, ctx))
            .and_then(|result| result)
            .map_err(|e| StageError::new(self.name(), format!("running `{}`: {e}", self.cmd)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(StageError::new(
                self.name(),
                format!("`{}` exited with {code}: {}", self.cmd, stderr.trim()),
            ));
        }

        let mut rel_path = file.rel_path;
        if let Some(ext) = &self.extension {
            rel_path.set_extension(ext);
        }
        Ok(FileAsset::new(rel_path, output.stdout))
    }
}
