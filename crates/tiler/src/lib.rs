//! Tile archive building and explosion.
//!
//! Both operations shell out to external deterministic tools (tippecanoe for
//! building, mb-util for explosion). The capability traits keep the
//! orchestration logic testable with fakes instead of real subprocesses.

pub mod builder;
pub mod extract;

pub use builder::{ArchiveBuilder, TippecanoeBuilder, ZoomRange};
pub use extract::{ArchiveExtractor, MbUtilExtractor};
