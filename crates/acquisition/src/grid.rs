//! Scalar grids and land masks.
//!
//! The downloaded monthly artifact is a CSV of `time,lat,lon,value` rows on
//! a regular lat/lon grid. Parsing assembles the rows into a dense row-major
//! grid; cells with no row or a non-numeric value stay missing.

use serde::{Deserialize, Serialize};

use tiles_common::{PipelineError, PipelineResult};

/// Default grid resolution when an axis has a single coordinate.
const DEFAULT_LAT_RES: f64 = 0.5;
const DEFAULT_LON_RES: f64 = 0.625;

/// A regular lat/lon grid of optional scalar values for one layer.
///
/// `values` is row-major: row index follows `lats`, column index `lons`.
#[derive(Debug, Clone)]
pub struct ScalarGrid {
    /// Sorted ascending latitude coordinates
    pub lats: Vec<f64>,
    /// Sorted ascending longitude coordinates
    pub lons: Vec<f64>,
    /// Row-major cell values, `None` where data is missing
    pub values: Vec<Option<f64>>,
}

impl ScalarGrid {
    pub fn rows(&self) -> usize {
        self.lats.len()
    }

    pub fn cols(&self) -> usize {
        self.lons.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values[row * self.cols() + col]
    }

    /// Latitude cell size, inferred from adjacent coordinates.
    pub fn lat_resolution(&self) -> f64 {
        if self.lats.len() > 1 {
            (self.lats[1] - self.lats[0]).abs()
        } else {
            DEFAULT_LAT_RES
        }
    }

    /// Longitude cell size, inferred from adjacent coordinates.
    pub fn lon_resolution(&self) -> f64 {
        if self.lons.len() > 1 {
            (self.lons[1] - self.lons[0]).abs()
        } else {
            DEFAULT_LON_RES
        }
    }

    /// Number of cells carrying a value.
    pub fn populated_cells(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Parse a monthly CSV (`time,lat,lon,value` header plus data rows) into a
/// scalar grid.
///
/// The value column may carry any name; only its position is fixed.
pub fn parse_monthly_csv(text: &str) -> PipelineResult<ScalarGrid> {
    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| PipelineError::GridParse("empty grid file".to_string()))?;

    let columns = header.split(',').count();
    if columns < 4 {
        return Err(PipelineError::GridParse(format!(
            "expected at least 4 columns (time,lat,lon,value), header has {}",
            columns
        )));
    }

    let mut points: Vec<(f64, f64, Option<f64>)> = Vec::new();
    for (line_no, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split(',');
        let _time = fields.next();
        let lat: f64 = fields
            .next()
            .and_then(|s| s.trim().parse().ok())
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| {
                PipelineError::GridParse(format!("bad latitude on data row {}", line_no + 1))
            })?;
        let lon: f64 = fields
            .next()
            .and_then(|s| s.trim().parse().ok())
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| {
                PipelineError::GridParse(format!("bad longitude on data row {}", line_no + 1))
            })?;
        let value: Option<f64> = fields
            .next()
            .and_then(|s| s.trim().parse().ok())
            .filter(|v: &f64| v.is_finite());
        points.push((lat, lon, value));
    }

    if points.is_empty() {
        return Err(PipelineError::GridParse(
            "grid file has no data rows".to_string(),
        ));
    }

    let lats = unique_sorted(points.iter().map(|p| p.0));
    let lons = unique_sorted(points.iter().map(|p| p.1));

    let cols = lons.len();
    let mut values = vec![None; lats.len() * cols];
    for (lat, lon, value) in points {
        // Coordinates come from identical text, so exact lookup is safe.
        let row = index_of(&lats, lat);
        let col = index_of(&lons, lon);
        if let (Some(row), Some(col)) = (row, col) {
            values[row * cols + col] = value;
        }
    }

    Ok(ScalarGrid { lats, lons, values })
}

fn unique_sorted(iter: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut coords: Vec<f64> = iter.collect();
    coords.sort_by(|a, b| a.partial_cmp(b).expect("non-finite grid coordinate"));
    coords.dedup();
    coords
}

fn index_of(sorted: &[f64], value: f64) -> Option<usize> {
    sorted
        .binary_search_by(|probe| probe.partial_cmp(&value).expect("non-finite grid coordinate"))
        .ok()
}

/// A boolean land/ocean mask with the same shape as a scalar grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandMask {
    pub rows: usize,
    pub cols: usize,
    /// Row-major cells, `true` for land
    pub cells: Vec<bool>,
}

impl LandMask {
    /// A mask marking every cell as land.
    pub fn all_land(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![true; rows * cols],
        }
    }

    /// Load a mask from a JSON artifact.
    pub async fn load(path: &std::path::Path) -> PipelineResult<Self> {
        let data = tokio::fs::read(path).await?;
        let mask: LandMask = serde_json::from_slice(&data)?;
        if mask.cells.len() != mask.rows * mask.cols {
            return Err(PipelineError::GridParse(format!(
                "mask cell count {} does not match {}x{}",
                mask.cells.len(),
                mask.rows,
                mask.cols
            )));
        }
        Ok(mask)
    }

    pub fn is_land(&self, row: usize, col: usize) -> bool {
        self.cells[row * self.cols + col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_csv() -> String {
        let mut csv = String::from("time,lat,lon,RH2M\n");
        for lat in 0..3 {
            for lon in 0..2 {
                csv.push_str(&format!(
                    "2022-01-01,{}.0,{}.0,{}\n",
                    lat * 10,
                    lon * 10,
                    lat * 2 + lon
                ));
            }
        }
        csv
    }

    #[test]
    fn test_parse_regular_grid() {
        let grid = parse_monthly_csv(&sample_csv()).unwrap();
        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.cols(), 2);
        assert_eq!(grid.get(0, 0), Some(0.0));
        assert_eq!(grid.get(2, 1), Some(5.0));
        assert_eq!(grid.populated_cells(), 6);
        assert_eq!(grid.lat_resolution(), 10.0);
        assert_eq!(grid.lon_resolution(), 10.0);
    }

    #[test]
    fn test_parse_missing_cells() {
        // Two rows omitted: their cells stay None.
        let csv = "time,lat,lon,T2M\n\
                   2022-01-01,0.0,0.0,1.5\n\
                   2022-01-01,1.0,1.0,2.5\n";
        let grid = parse_monthly_csv(csv).unwrap();
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.cols(), 2);
        assert_eq!(grid.get(0, 1), None);
        assert_eq!(grid.get(1, 0), None);
        assert_eq!(grid.populated_cells(), 2);
    }

    #[test]
    fn test_parse_rejects_empty_and_malformed() {
        assert!(parse_monthly_csv("").is_err());
        assert!(parse_monthly_csv("time,lat,lon,RH2M\n").is_err());
        assert!(parse_monthly_csv("time,lat\n2022-01-01,0.0\n").is_err());
        assert!(parse_monthly_csv("time,lat,lon,RH2M\n2022-01-01,x,0.0,1.0\n").is_err());
    }

    #[test]
    fn test_nan_value_treated_as_missing() {
        let csv = "time,lat,lon,RH2M\n\
                   2022-01-01,0.0,0.0,NaN\n\
                   2022-01-01,1.0,0.0,3.0\n";
        let grid = parse_monthly_csv(csv).unwrap();
        assert_eq!(grid.get(0, 0), None);
        assert_eq!(grid.get(1, 0), Some(3.0));
    }

    #[test]
    fn test_single_coordinate_fallback_resolution() {
        let csv = "time,lat,lon,RH2M\n2022-01-01,5.0,7.0,1.0\n";
        let grid = parse_monthly_csv(csv).unwrap();
        assert_eq!(grid.lat_resolution(), DEFAULT_LAT_RES);
        assert_eq!(grid.lon_resolution(), DEFAULT_LON_RES);
    }

    #[test]
    fn test_all_land_mask() {
        let mask = LandMask::all_land(3, 2);
        assert!(mask.is_land(0, 0));
        assert!(mask.is_land(2, 1));
    }
}
