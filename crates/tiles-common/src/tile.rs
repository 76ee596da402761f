//! Tile coordinates for the exploded tile tree.

use serde::{Deserialize, Serialize};

/// A tile coordinate (zoom/column/row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Relative path of this tile within an exploded tree.
    /// Format: `{z}/{x}/{y}.pbf`
    pub fn relative_path(&self) -> String {
        format!("{}/{}/{}.pbf", self.z, self.x, self.y)
    }

    /// Parse a relative tree path back into a coordinate.
    ///
    /// Returns None for paths that are not `{z}/{x}/{y}.pbf`.
    pub fn from_relative_path(path: &str) -> Option<Self> {
        let mut parts = path.split('/');
        let z = parts.next()?.parse().ok()?;
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.strip_suffix(".pbf")?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { z, x, y })
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_roundtrip() {
        let coord = TileCoord::new(3, 5, 2);
        assert_eq!(coord.relative_path(), "3/5/2.pbf");
        assert_eq!(
            TileCoord::from_relative_path("3/5/2.pbf"),
            Some(coord)
        );
    }

    #[test]
    fn test_from_relative_path_rejects_garbage() {
        assert_eq!(TileCoord::from_relative_path("metadata.json"), None);
        assert_eq!(TileCoord::from_relative_path("3/5/2.png"), None);
        assert_eq!(TileCoord::from_relative_path("3/5/2/extra.pbf"), None);
        assert_eq!(TileCoord::from_relative_path("a/b/c.pbf"), None);
    }
}
