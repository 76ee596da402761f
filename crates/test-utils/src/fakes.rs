//! Counting fake implementations of the pipeline capability traits.
//!
//! Each fake is deterministic: the same inputs always produce byte-identical
//! outputs, so tests can assert that re-runs leave artifacts unchanged. The
//! invocation counters let tests prove a stage was or was not executed.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use acquisition::GridSource;
use tiles_common::{Layer, PipelineError, PipelineResult};
use tiler::{ArchiveBuilder, ArchiveExtractor, ZoomRange};

/// Grid source that writes a fixed CSV body for every layer.
pub struct FakeGridSource {
    csv: String,
    fail: bool,
    fetches: AtomicUsize,
}

impl FakeGridSource {
    pub fn new(csv: impl Into<String>) -> Self {
        Self {
            csv: csv.into(),
            fail: false,
            fetches: AtomicUsize::new(0),
        }
    }

    /// A source whose every fetch fails with a transport error.
    pub fn failing() -> Self {
        Self {
            csv: String::new(),
            fail: true,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GridSource for FakeGridSource {
    async fn fetch(&self, layer: &Layer, dest: &Path) -> PipelineResult<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::Transport(format!(
                "simulated fetch failure for {}",
                layer
            )));
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &self.csv).await?;
        Ok(())
    }
}

/// Archive builder that concatenates its sources behind a header instead of
/// running tippecanoe.
pub struct FakeBuilder {
    fail: bool,
    builds: AtomicUsize,
}

impl FakeBuilder {
    pub fn new() -> Self {
        Self {
            fail: false,
            builds: AtomicUsize::new(0),
        }
    }

    /// A builder whose every build fails, as a crashed tool would.
    pub fn failing() -> Self {
        Self {
            fail: true,
            builds: AtomicUsize::new(0),
        }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl Default for FakeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArchiveBuilder for FakeBuilder {
    async fn build(
        &self,
        layer: &Layer,
        sources: &[&Path],
        zoom: ZoomRange,
        dest: &Path,
    ) -> PipelineResult<()> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::Build(format!(
                "simulated build failure for {}",
                layer
            )));
        }

        let mut data = format!(
            "archive layer={} zoom={}..{}\n",
            layer.variable, zoom.min, zoom.max
        )
        .into_bytes();
        for source in sources {
            data.extend_from_slice(&tokio::fs::read(source).await?);
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, data).await?;
        Ok(())
    }
}

/// Coordinates the fake extractor materialises for every archive.
const FAKE_TILES: [(u32, u32, u32); 3] = [(0, 0, 0), (1, 0, 0), (1, 0, 1)];

/// Extractor that explodes an archive into a small fixed tile tree. Tile
/// bytes are derived from the archive bytes, so a changed archive yields
/// changed tiles and an unchanged archive yields identical tiles.
pub struct FakeExtractor {
    extractions: AtomicUsize,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self {
            extractions: AtomicUsize::new(0),
        }
    }

    pub fn extractions(&self) -> usize {
        self.extractions.load(Ordering::SeqCst)
    }
}

impl Default for FakeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArchiveExtractor for FakeExtractor {
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> PipelineResult<()> {
        self.extractions.fetch_add(1, Ordering::SeqCst);

        let data = tokio::fs::read(archive).await?;
        let checksum: u64 = data.iter().map(|b| *b as u64).sum();

        for (z, x, y) in FAKE_TILES {
            let tile_path = dest_dir.join(format!("{}/{}", z, x));
            tokio::fs::create_dir_all(&tile_path).await?;
            tokio::fs::write(
                tile_path.join(format!("{}.pbf", y)),
                format!("tile {}/{}/{} checksum={}", z, x, y, checksum),
            )
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiles_common::TimeKey;

    #[tokio::test]
    async fn test_fake_builder_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("layer.geojson");
        tokio::fs::write(&source, "{}").await.unwrap();

        let layer = Layer::new("RH2M", TimeKey::new(2022, 1).unwrap());
        let zoom = ZoomRange::new(0, 3).unwrap();
        let builder = FakeBuilder::new();

        let first = dir.path().join("first.mbtiles");
        let second = dir.path().join("second.mbtiles");
        builder.build(&layer, &[&source], zoom, &first).await.unwrap();
        builder.build(&layer, &[&source], zoom, &second).await.unwrap();

        assert_eq!(builder.builds(), 2);
        assert_eq!(
            tokio::fs::read(&first).await.unwrap(),
            tokio::fs::read(&second).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_fake_extractor_tracks_archive_content() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("layer.mbtiles");
        tokio::fs::write(&archive, "abc").await.unwrap();

        let extractor = FakeExtractor::new();
        let tree_a = dir.path().join("a");
        let tree_b = dir.path().join("b");
        extractor.extract(&archive, &tree_a).await.unwrap();

        tokio::fs::write(&archive, "abcd").await.unwrap();
        extractor.extract(&archive, &tree_b).await.unwrap();

        let tile_a = tokio::fs::read(tree_a.join("0/0/0.pbf")).await.unwrap();
        let tile_b = tokio::fs::read(tree_b.join("0/0/0.pbf")).await.unwrap();
        assert_ne!(tile_a, tile_b);
        assert_eq!(extractor.extractions(), 2);
    }
}
