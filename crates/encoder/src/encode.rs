//! Grid-to-polygon encoding and feature collection persistence.

use std::path::Path;

use tokio::fs;
use tracing::{debug, info, instrument};

use acquisition::{LandMask, ScalarGrid};
use tiles_common::{Layer, PipelineError, PipelineResult};

use crate::geojson::{Feature, FeatureCollection};

/// Encode one layer's scalar grid into a polygon feature collection.
///
/// Each in-mask cell with a value becomes a rectangular footprint centred on
/// the grid point, carrying the value under an attribute named after the
/// variable. Fails fast when grid and mask dimensions disagree.
#[instrument(skip(grid, mask), fields(layer = %layer))]
pub fn encode_layer(
    layer: &Layer,
    grid: &ScalarGrid,
    mask: &LandMask,
) -> PipelineResult<FeatureCollection> {
    if grid.rows() != mask.rows || grid.cols() != mask.cols {
        return Err(PipelineError::DataShape {
            grid_rows: grid.rows(),
            grid_cols: grid.cols(),
            mask_rows: mask.rows,
            mask_cols: mask.cols,
        });
    }

    let half_lat = grid.lat_resolution() / 2.0;
    let half_lon = grid.lon_resolution() / 2.0;

    let mut collection = FeatureCollection::new();
    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            if !mask.is_land(row, col) {
                continue;
            }
            let value = match grid.get(row, col) {
                Some(v) => v,
                None => continue,
            };

            let lat = grid.lats[row];
            let lon = grid.lons[col];

            // Rectangle ring: SW, SE, NE, NW, closed back at SW.
            let ring = vec![
                [lon - half_lon, lat - half_lat],
                [lon + half_lon, lat - half_lat],
                [lon + half_lon, lat + half_lat],
                [lon - half_lon, lat + half_lat],
                [lon - half_lon, lat - half_lat],
            ];

            collection.push(Feature::polygon(ring).with_property(&layer.variable, value));
        }
    }

    debug!(
        features = collection.len(),
        cells = grid.rows() * grid.cols(),
        "Encoded grid cells to polygon features"
    );

    Ok(collection)
}

/// Persist a feature collection compactly, via temp-file + rename so a
/// partial write never satisfies a later existence check.
pub async fn write_feature_collection(
    collection: &FeatureCollection,
    dest: &Path,
) -> PipelineResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    let data = serde_json::to_vec(collection)?;
    let temp_path = dest.with_extension("geojson.partial");
    fs::write(&temp_path, &data).await?;
    fs::rename(&temp_path, dest).await?;

    info!(
        path = %dest.display(),
        features = collection.len(),
        bytes = data.len(),
        "Wrote feature collection"
    );

    Ok(())
}
