//! Tile archive explosion into an addressable tile tree.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use tiles_common::{PipelineError, PipelineResult};

/// Explodes a tile archive into a `{z}/{x}/{y}.pbf` directory tree.
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive` into `dest_dir`. On success `dest_dir` holds the
    /// complete tree; on failure no partial tree is left behind.
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> PipelineResult<()>;
}

/// ArchiveExtractor backed by the mb-util subprocess.
pub struct MbUtilExtractor {
    program: String,
    timeout: Duration,
}

impl MbUtilExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "mb-util".to_string(),
            timeout,
        }
    }

    /// Override the binary name or path.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl ArchiveExtractor for MbUtilExtractor {
    #[instrument(skip(self), fields(archive = %archive.display(), dest = %dest_dir.display()))]
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> PipelineResult<()> {
        if !archive.exists() {
            return Err(PipelineError::Extract(format!(
                "tile archive not found: {}",
                archive.display()
            )));
        }

        if let Some(parent) = dest_dir.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // The tool requires its output directory to not exist; extract into
        // a scratch path and rename into place only on success.
        let temp_dir = dest_dir.with_extension("extracting");
        if temp_dir.exists() {
            tokio::fs::remove_dir_all(&temp_dir).await?;
        }

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.program)
                .arg("--image_format=pbf")
                .arg(archive)
                .arg(&temp_dir)
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .output(),
        )
        .await
        .map_err(|_| {
            PipelineError::Extract(format!(
                "{} timed out after {}s",
                self.program,
                self.timeout.as_secs()
            ))
        })?
        .map_err(|e| PipelineError::Extract(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tokio::fs::remove_dir_all(&temp_dir).await.ok();
            return Err(PipelineError::Extract(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let produced = temp_dir.exists() && has_any_tile(&temp_dir).await?;
        if !produced {
            tokio::fs::remove_dir_all(&temp_dir).await.ok();
            return Err(PipelineError::Extract(format!(
                "extractor produced no tiles from {}",
                archive.display()
            )));
        }

        // Re-runs replace the previous tree wholesale; extraction is
        // deterministic so the result is byte-identical.
        if dest_dir.exists() {
            tokio::fs::remove_dir_all(dest_dir).await?;
        }
        tokio::fs::rename(&temp_dir, dest_dir).await?;

        info!("Tile archive exploded");
        Ok(())
    }
}

/// Whether an exploded tree contains at least one `.pbf` tile.
async fn has_any_tile(dir: &Path) -> PipelineResult<bool> {
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().map_or(false, |ext| ext == "pbf") {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
