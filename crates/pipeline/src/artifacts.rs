//! Deterministic local and remote paths for every layer artifact.

use std::path::{Path, PathBuf};

use tiles_common::Layer;

/// All artifact locations for one layer, derived from its identity and the
/// configured workspace directories. Recomputing these between runs is what
/// makes resumption possible without a state database.
#[derive(Debug, Clone)]
pub struct LayerArtifacts {
    /// Raw gridded CSV as downloaded: `{data_dir}/{variable}_{MM}_{YYYY}.csv`.
    pub grid_csv: PathBuf,
    /// Encoded FeatureCollection: `{data_dir}/{slug}.geojson`.
    pub feature_collection: PathBuf,
    /// Tile archive: `{mbtiles_dir}/{slug}.mbtiles`.
    pub archive: PathBuf,
    /// Exploded `{z}/{x}/{y}.pbf` tree root: `{tiles_dir}/{slug}`.
    pub tile_tree: PathBuf,
    /// Remote key prefix: `tiles/{slug}`.
    pub remote_prefix: String,
}

impl LayerArtifacts {
    pub fn new(layer: &Layer, data_dir: &Path, mbtiles_dir: &Path, tiles_dir: &Path) -> Self {
        let slug = layer.slug();
        Self {
            grid_csv: data_dir.join(layer.grid_csv_name()),
            feature_collection: data_dir.join(format!("{}.geojson", slug)),
            archive: mbtiles_dir.join(format!("{}.mbtiles", slug)),
            tile_tree: tiles_dir.join(&slug),
            remote_prefix: layer.remote_prefix(),
        }
    }
}
