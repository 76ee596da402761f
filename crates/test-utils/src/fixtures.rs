//! Deterministic grid and mask fixtures.

/// A monthly grid CSV with `rows` x `cols` cells on a 1-degree grid starting
/// at the origin. Every cell carries the value `row * cols + col`.
pub fn monthly_grid_csv(variable: &str, rows: usize, cols: usize) -> String {
    let mut csv = format!("time,lat,lon,{}\n", variable);
    for row in 0..rows {
        for col in 0..cols {
            csv.push_str(&format!(
                "2022-01-01,{}.0,{}.0,{}\n",
                row,
                col,
                row * cols + col
            ));
        }
    }
    csv
}

/// The standard 4x4 relative humidity grid used across orchestration tests.
/// Fully populated, so an all-land mask yields 16 features.
pub fn rh2m_grid_csv() -> String {
    monthly_grid_csv("RH2M", 4, 4)
}

/// A land mask JSON artifact. `land` lists cells row-major.
pub fn land_mask_json(rows: usize, cols: usize, land: &[bool]) -> String {
    assert_eq!(land.len(), rows * cols, "mask fixture shape mismatch");
    let cells: Vec<String> = land.iter().map(|b| b.to_string()).collect();
    format!(
        r#"{{"rows":{},"cols":{},"cells":[{}]}}"#,
        rows,
        cols,
        cells.join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_fixture_parses() {
        let grid = acquisition::parse_monthly_csv(&rh2m_grid_csv()).unwrap();
        assert_eq!(grid.rows(), 4);
        assert_eq!(grid.cols(), 4);
        assert_eq!(grid.populated_cells(), 16);
    }

    #[tokio::test]
    async fn test_mask_fixture_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.json");
        let mut land = vec![true; 16];
        land[0] = false;
        tokio::fs::write(&path, land_mask_json(4, 4, &land))
            .await
            .unwrap();

        let mask = acquisition::LandMask::load(&path).await.unwrap();
        assert!(!mask.is_land(0, 0));
        assert!(mask.is_land(3, 3));
    }
}
