//! Stage orchestration for the climate-tiles pipeline.
//!
//! Drives each layer through the fixed stage sequence
//! `DOWNLOAD -> ENCODE -> BUILD_ARCHIVE -> EXPLODE -> PUBLISH`, with
//! artifact-existence pre-checks, per-layer failure isolation, bounded
//! concurrency across layers, and cooperative cancellation between stages.

pub mod artifacts;
pub mod config;
pub mod orchestrator;
pub mod stage;
pub mod summary;

pub use artifacts::LayerArtifacts;
pub use config::PipelineConfig;
pub use orchestrator::{CancelFlag, Orchestrator};
pub use stage::{SkipPolicy, Stage};
pub use summary::{LayerReport, LayerState, RunSummary};
