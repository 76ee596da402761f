//! Tile publication for the climate-tiles pipeline.
//!
//! Uploads exploded tile trees to an object store under the layer's derived
//! prefix, with the content-type metadata a CDN needs to serve the binary
//! vector format correctly.

pub mod store;
pub mod sync;

pub use store::{ObjectStorage, PublicationTarget};
pub use sync::{sync_tile_tree, SyncOutcome};

/// Content type required on every published tile. The object store's default
/// inference gets the binary vector format wrong, which breaks CDN and
/// client consumption.
pub const TILE_CONTENT_TYPE: &str = "application/x-protobuf";
