//! Layer identity: one variable for one time period and region.
//!
//! A Layer is immutable once created and derives every downstream artifact
//! name deterministically, so re-running the pipeline for the same Layer
//! always targets the same paths.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Geographic region tag applied to every layer.
pub const REGION_LAND: &str = "land";

/// A year+month time key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeKey {
    pub year: i32,
    pub month: u32,
}

impl TimeKey {
    /// Create a time key, validating the month.
    pub fn new(year: i32, month: u32) -> PipelineResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(PipelineError::Config(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }
        Ok(Self { year, month })
    }

    /// The next month, rolling over year boundaries.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Iterate inclusive months from `start` to `end`.
    pub fn range(start: TimeKey, end: TimeKey) -> impl Iterator<Item = TimeKey> {
        let mut current = Some(start);
        std::iter::from_fn(move || {
            let key = current?;
            if key > end {
                current = None;
                return None;
            }
            current = Some(key.next());
            Some(key)
        })
    }
}

impl std::fmt::Display for TimeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One unit of pipeline work: a variable for one time period and region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layer {
    /// Variable name (e.g. "RH2M", "PRECTOT", "T2M")
    pub variable: String,
    /// Year and month
    pub time: TimeKey,
    /// Geographic tag, always "land"
    pub region: String,
}

impl Layer {
    pub fn new(variable: impl Into<String>, time: TimeKey) -> Self {
        Self {
            variable: variable.into(),
            time,
            region: REGION_LAND.to_string(),
        }
    }

    /// Deterministic slug used in every artifact name.
    /// Format: `{variable}_{month:02}_{year}_{region}`
    pub fn slug(&self) -> String {
        format!(
            "{}_{:02}_{}_{}",
            self.variable, self.time.month, self.time.year, self.region
        )
    }

    /// Object-store prefix for this layer's published tiles.
    /// Format: `tiles/{variable}_{month:02}_{year}_{region}`
    pub fn remote_prefix(&self) -> String {
        format!("tiles/{}", self.slug())
    }

    /// Filename of the downloaded monthly grid file. No region component;
    /// the download precedes land masking.
    /// Format: `{variable}_{month:02}_{year}.csv`
    pub fn grid_csv_name(&self) -> String {
        format!(
            "{}_{:02}_{}.csv",
            self.variable, self.time.month, self.time.year
        )
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}
