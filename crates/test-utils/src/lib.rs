//! Shared test utilities for the climate-tiles workspace.
//!
//! Provides grid and mask fixtures plus counting fake implementations of the
//! pipeline's capability traits, so orchestration tests run without network
//! access or the external tile tools.

pub mod fakes;
pub mod fixtures;

pub use fakes::{FakeBuilder, FakeExtractor, FakeGridSource};
pub use fixtures::{land_mask_json, monthly_grid_csv, rh2m_grid_csv};
