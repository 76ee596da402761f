//! Tile archive building via the external renderer.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use tiles_common::{Layer, PipelineError, PipelineResult};

/// Inclusive zoom bounds applied uniformly across all layers so visual
/// fidelity is consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomRange {
    pub min: u32,
    pub max: u32,
}

impl ZoomRange {
    pub fn new(min: u32, max: u32) -> PipelineResult<Self> {
        if min > max {
            return Err(PipelineError::Config(format!(
                "minzoom {} exceeds maxzoom {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }
}

/// Builds a single tile archive from one or more feature collection files.
#[async_trait]
pub trait ArchiveBuilder: Send + Sync {
    /// Build an archive for `layer` spanning `zoom` from `sources`, writing
    /// the finished archive at `dest`. The archive's internal tile layer
    /// must be named after the layer's variable.
    async fn build(
        &self,
        layer: &Layer,
        sources: &[&Path],
        zoom: ZoomRange,
        dest: &Path,
    ) -> PipelineResult<()>;
}

/// ArchiveBuilder backed by the tippecanoe subprocess.
pub struct TippecanoeBuilder {
    /// Tool binary name or path
    program: String,
    /// Kill the subprocess after this long
    timeout: Duration,
    /// Douglas-Peucker simplification factor passed to the tool
    simplification: u32,
    /// Tile buffer in screen pixels
    buffer: u32,
}

impl TippecanoeBuilder {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "tippecanoe".to_string(),
            timeout,
            simplification: 10,
            buffer: 64,
        }
    }

    /// Override the binary name or path (used when the tool is not on PATH).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl ArchiveBuilder for TippecanoeBuilder {
    #[instrument(skip(self, sources), fields(layer = %layer, dest = %dest.display()))]
    async fn build(
        &self,
        layer: &Layer,
        sources: &[&Path],
        zoom: ZoomRange,
        dest: &Path,
    ) -> PipelineResult<()> {
        if sources.is_empty() {
            return Err(PipelineError::Build(
                "no feature collections to build from".to_string(),
            ));
        }
        for source in sources {
            if !source.exists() {
                return Err(PipelineError::Build(format!(
                    "feature collection not found: {}",
                    source.display()
                )));
            }
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut cmd = Command::new(&self.program);
        cmd.arg("-o")
            .arg(dest)
            .arg("-l")
            .arg(&layer.variable)
            .arg("-Z")
            .arg(zoom.min.to_string())
            .arg("-z")
            .arg(zoom.max.to_string())
            .arg("--no-feature-limit")
            .arg("--no-tile-size-limit")
            .arg("--drop-densest-as-needed")
            .arg("--extend-zooms-if-still-dropping")
            .arg(format!("--simplification={}", self.simplification))
            .arg(format!("--buffer={}", self.buffer))
            .arg("--force")
            .arg("--quiet");
        for source in sources {
            cmd.arg(source);
        }
        cmd.stdout(Stdio::null()).stderr(Stdio::piped());

        debug!(program = %self.program, "Invoking tile renderer");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                PipelineError::Build(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| PipelineError::Build(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Build(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        // A zero-byte or missing archive means the tool failed silently.
        let size = tokio::fs::metadata(dest)
            .await
            .map_err(|_| {
                PipelineError::Build(format!(
                    "renderer produced no archive at {}",
                    dest.display()
                ))
            })?
            .len();
        if size == 0 {
            tokio::fs::remove_file(dest).await.ok();
            return Err(PipelineError::Build(format!(
                "renderer produced an empty archive at {}",
                dest.display()
            )));
        }

        info!(bytes = size, "Tile archive built");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiles_common::{ErrorKind, TimeKey};

    fn layer() -> Layer {
        Layer::new("RH2M", TimeKey::new(2022, 1).unwrap())
    }

    #[test]
    fn test_zoom_range_validation() {
        assert!(ZoomRange::new(0, 10).is_ok());
        assert!(ZoomRange::new(5, 5).is_ok());
        let err = ZoomRange::new(6, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_missing_source_is_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let builder = TippecanoeBuilder::new(Duration::from_secs(5));
        let missing = dir.path().join("absent.geojson");
        let err = builder
            .build(
                &layer(),
                &[missing.as_path()],
                ZoomRange::new(0, 5).unwrap(),
                &dir.path().join("out.mbtiles"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Build);
    }

    #[tokio::test]
    async fn test_empty_source_list_is_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let builder = TippecanoeBuilder::new(Duration::from_secs(5));
        let err = builder
            .build(
                &layer(),
                &[],
                ZoomRange::new(0, 5).unwrap(),
                &dir.path().join("out.mbtiles"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Build);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.geojson");
        tokio::fs::write(&source, b"{}").await.unwrap();

        // `false` ignores its arguments and always exits 1.
        let builder = TippecanoeBuilder::new(Duration::from_secs(5)).with_program("false");
        let err = builder
            .build(
                &layer(),
                &[source.as_path()],
                ZoomRange::new(0, 5).unwrap(),
                &dir.path().join("out.mbtiles"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Build);
    }

    #[tokio::test]
    async fn test_silent_tool_with_no_output_is_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.geojson");
        tokio::fs::write(&source, b"{}").await.unwrap();

        // `true` exits 0 without writing the archive.
        let builder = TippecanoeBuilder::new(Duration::from_secs(5)).with_program("true");
        let err = builder
            .build(
                &layer(),
                &[source.as_path()],
                ZoomRange::new(0, 5).unwrap(),
                &dir.path().join("out.mbtiles"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Build);
    }
}
