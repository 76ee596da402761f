//! Common types and utilities shared across the climate-tiles pipeline.

pub mod error;
pub mod layer;
pub mod tile;

pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use layer::{Layer, TimeKey};
pub use tile::TileCoord;
