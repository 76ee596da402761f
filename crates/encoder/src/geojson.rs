//! Minimal typed GeoJSON for polygon feature collections.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A GeoJSON FeatureCollection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCollection {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type")]
    pub type_: String,

    /// Ordered set of features.
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new()
    }
}

/// A GeoJSON Feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    /// Type identifier (always "Feature").
    #[serde(rename = "type")]
    pub type_: String,

    /// The geometry of this feature.
    pub geometry: Geometry,

    /// Attribute values keyed by name.
    pub properties: Map<String, Value>,
}

impl Feature {
    /// Create a polygon feature from an exterior ring.
    pub fn polygon(ring: Vec<[f64; 2]>) -> Self {
        Self {
            type_: "Feature".to_string(),
            geometry: Geometry::Polygon {
                coordinates: vec![ring],
            },
            properties: Map::new(),
        }
    }

    /// Set a numeric property.
    pub fn with_property(mut self, name: impl Into<String>, value: f64) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

/// GeoJSON geometry types used by the encoder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    /// A polygon geometry: one exterior ring, optional holes.
    Polygon {
        /// Array of rings, each an array of [longitude, latitude] pairs.
        coordinates: Vec<Vec<[f64; 2]>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_feature_serialization() {
        let feature = Feature::polygon(vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
            [0.0, 0.0],
        ])
        .with_property("RH2M", 72.5);

        let json = serde_json::to_value(&feature).unwrap();
        assert_eq!(json["type"], "Feature");
        assert_eq!(json["geometry"]["type"], "Polygon");
        assert_eq!(json["properties"]["RH2M"], 72.5);
        assert_eq!(json["geometry"]["coordinates"][0][2][0], 1.0);
    }

    #[test]
    fn test_collection_roundtrip() {
        let mut collection = FeatureCollection::new();
        collection.push(
            Feature::polygon(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]])
                .with_property("T2M", -3.25),
        );

        let text = serde_json::to_string(&collection).unwrap();
        let parsed: FeatureCollection = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, collection);
        assert_eq!(parsed.len(), 1);
    }
}
