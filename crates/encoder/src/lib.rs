//! Geometry encoder for the climate-tiles pipeline.
//!
//! Converts a scalar grid plus land mask into a GeoJSON polygon feature
//! collection, one grid-cell footprint per in-mask cell, with the scalar
//! value stored under an attribute named after the variable.

pub mod encode;
pub mod geojson;

pub use encode::{encode_layer, write_feature_collection};
pub use geojson::{Feature, FeatureCollection, Geometry};
