//! Grid acquisition for the climate-tiles pipeline.
//!
//! Covers the DOWNLOAD stage: fetching one monthly grid file per layer from
//! an upstream source, plus parsing the file into a regular scalar grid and
//! loading the land mask the encoder consumes.

pub mod grid;
pub mod source;

pub use grid::{parse_monthly_csv, LandMask, ScalarGrid};
pub use source::{GridSource, HttpGridSource, HttpSourceConfig, LocalGridSource};
