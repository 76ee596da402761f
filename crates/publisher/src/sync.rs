//! Synchronizing upload of an exploded tile tree.

use std::collections::HashMap;
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use tiles_common::{PipelineError, PipelineResult};

use crate::store::ObjectStorage;

/// What a tile-tree sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Objects uploaded (new or overwritten)
    pub uploaded: usize,
    /// Objects skipped as already identical
    pub skipped: usize,
    /// Total bytes uploaded
    pub bytes_uploaded: u64,
}

/// Upload every tile in `local_dir` under `remote_prefix`, setting
/// `content_type` on each object.
///
/// Sync semantics: objects present remotely but absent locally are left
/// untouched, objects whose size differs are overwritten, and objects with
/// matching size are skipped. The external extraction is deterministic, so
/// equal size under the same key means identical content.
#[instrument(skip(storage), fields(local = %local_dir.display(), prefix = %remote_prefix))]
pub async fn sync_tile_tree(
    storage: &ObjectStorage,
    local_dir: &Path,
    remote_prefix: &str,
    content_type: &str,
) -> PipelineResult<SyncOutcome> {
    let remote_sizes: HashMap<String, u64> = storage
        .list_with_sizes(remote_prefix)
        .await?
        .into_iter()
        .collect();

    let mut outcome = SyncOutcome::default();

    for entry in WalkDir::new(local_dir).sort_by_file_name() {
        let entry =
            entry.map_err(|e| PipelineError::Io(std::io::Error::other(e.to_string())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        // Only tile objects are published; the extractor's sidecar metadata
        // stays local.
        if entry.path().extension().map_or(true, |ext| ext != "pbf") {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(local_dir)
            .map_err(|e| PipelineError::Io(std::io::Error::other(e.to_string())))?;
        let key = format!("{}/{}", remote_prefix, relative.display());

        let data = tokio::fs::read(entry.path()).await?;
        let size = data.len() as u64;

        if remote_sizes.get(&key) == Some(&size) {
            debug!(key = %key, "Object already identical, skipping");
            outcome.skipped += 1;
            continue;
        }

        storage.put(&key, Bytes::from(data), content_type).await?;
        outcome.uploaded += 1;
        outcome.bytes_uploaded += size;
    }

    info!(
        uploaded = outcome.uploaded,
        skipped = outcome.skipped,
        bytes = outcome.bytes_uploaded,
        "Tile tree synced"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TILE_CONTENT_TYPE;
    use object_store::memory::InMemory;
    use std::sync::Arc;

    async fn write_tile(root: &Path, rel: &str, data: &[u8]) {
        let path = root.join(rel);
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(path, data).await.unwrap();
    }

    #[tokio::test]
    async fn test_sync_uploads_all_tiles() {
        let dir = tempfile::tempdir().unwrap();
        write_tile(dir.path(), "0/0/0.pbf", b"root").await;
        write_tile(dir.path(), "1/0/1.pbf", b"child").await;
        write_tile(dir.path(), "metadata.json", b"{}").await;

        let storage = ObjectStorage::with_store(Arc::new(InMemory::new()), "test");
        let outcome = sync_tile_tree(&storage, dir.path(), "tiles/RH2M_01_2022_land", TILE_CONTENT_TYPE)
            .await
            .unwrap();

        assert_eq!(outcome.uploaded, 2);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.bytes_uploaded, 9);

        assert!(storage
            .exists("tiles/RH2M_01_2022_land/0/0/0.pbf")
            .await
            .unwrap());
        // Sidecar metadata is not published.
        assert!(!storage
            .exists("tiles/RH2M_01_2022_land/metadata.json")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_second_sync_skips_identical_objects() {
        let dir = tempfile::tempdir().unwrap();
        write_tile(dir.path(), "0/0/0.pbf", b"root").await;

        let storage = ObjectStorage::with_store(Arc::new(InMemory::new()), "test");
        let prefix = "tiles/T2M_06_2023_land";

        let first = sync_tile_tree(&storage, dir.path(), prefix, TILE_CONTENT_TYPE)
            .await
            .unwrap();
        assert_eq!(first.uploaded, 1);

        let second = sync_tile_tree(&storage, dir.path(), prefix, TILE_CONTENT_TYPE)
            .await
            .unwrap();
        assert_eq!(second.uploaded, 0);
        assert_eq!(second.skipped, 1);
    }

    #[tokio::test]
    async fn test_differing_object_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        write_tile(dir.path(), "0/0/0.pbf", b"new-longer-content").await;

        let storage = ObjectStorage::with_store(Arc::new(InMemory::new()), "test");
        let prefix = "tiles/T2M_06_2023_land";
        storage
            .put(
                &format!("{}/0/0/0.pbf", prefix),
                Bytes::from_static(b"old"),
                TILE_CONTENT_TYPE,
            )
            .await
            .unwrap();

        let outcome = sync_tile_tree(&storage, dir.path(), prefix, TILE_CONTENT_TYPE)
            .await
            .unwrap();
        assert_eq!(outcome.uploaded, 1);
        assert_eq!(
            storage.get(&format!("{}/0/0/0.pbf", prefix)).await.unwrap(),
            Bytes::from_static(b"new-longer-content")
        );
    }

    #[tokio::test]
    async fn test_remote_only_objects_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        write_tile(dir.path(), "0/0/0.pbf", b"root").await;

        let storage = ObjectStorage::with_store(Arc::new(InMemory::new()), "test");
        let prefix = "tiles/PRECTOT_03_2024_land";
        storage
            .put(
                &format!("{}/5/1/2.pbf", prefix),
                Bytes::from_static(b"stale"),
                TILE_CONTENT_TYPE,
            )
            .await
            .unwrap();

        sync_tile_tree(&storage, dir.path(), prefix, TILE_CONTENT_TYPE)
            .await
            .unwrap();

        // This pipeline never deletes stale tiles.
        assert!(storage
            .exists(&format!("{}/5/1/2.pbf", prefix))
            .await
            .unwrap());
    }
}
