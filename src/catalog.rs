//! The read-side surface the similarity engine needs from a catalog.
//!
//! All similarity queries go through these two traits, never through a
//! `Connection` directly. `Database` and its `ReadSnapshot` are the SQLite
//! implementation; tests substitute their own.

use crate::db::Result;
use crate::db::models::{
    ArtistHandle, ArtistId, ClusterHandle, ClusterId, ReleaseHandle, ReleaseId, TrackHandle,
    TrackId,
};

/// Something that can hand out consistent read snapshots.
pub trait Catalog {
    type Snapshot<'a>: CatalogSnapshot
    where
        Self: 'a;

    /// Start a read-only snapshot. It is released when dropped.
    fn begin_read_snapshot(&self) -> Result<Self::Snapshot<'_>>;
}

/// Point lookups against one consistent view of the catalog.
///
/// A lookup of an id that does not exist returns `Ok(None)`; `Err` is kept
/// for storage failures.
pub trait CatalogSnapshot {
    fn resolve_track(&self, id: TrackId) -> Result<Option<TrackHandle>>;
    fn resolve_release(&self, id: ReleaseId) -> Result<Option<ReleaseHandle>>;
    fn resolve_artist(&self, id: ArtistId) -> Result<Option<ArtistHandle>>;
    fn resolve_cluster(&self, id: ClusterId) -> Result<Option<ClusterHandle>>;
}
