use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::collections::BTreeSet;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Declares a copyable row-id newtype that binds to and reads from SQLite
/// as a plain INTEGER.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                self.0.to_sql()
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

id_type!(
    /// Row id in `tracks`.
    TrackId
);
id_type!(
    /// Row id in `releases`.
    ReleaseId
);
id_type!(
    /// Row id in `artists`.
    ArtistId
);
id_type!(
    /// Row id in `clusters`.
    ClusterId
);

/// Data for inserting or updating a track.
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub file_path: String,
    pub title: Option<String>,
    pub release_id: Option<ReleaseId>,
}

/// A track as seen through a read snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackHandle {
    pub id: TrackId,
    pub file_path: String,
    pub title: Option<String>,
    pub release: Option<ReleaseId>,
    pub artists: BTreeSet<ArtistId>,
    pub clusters: BTreeSet<ClusterId>,
}

impl TrackHandle {
    /// Title if tagged, otherwise the file path.
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.file_path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseHandle {
    pub id: ReleaseId,
    pub name: String,
    pub track_ids: BTreeSet<TrackId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtistHandle {
    pub id: ArtistId,
    pub name: String,
    pub track_ids: BTreeSet<TrackId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterHandle {
    pub id: ClusterId,
    /// Namespace of the cluster, e.g. "GENRE".
    pub cluster_type: String,
    pub name: String,
    pub member_track_ids: BTreeSet<TrackId>,
}

/// One row of the `clusters` listing.
#[derive(Debug, Clone)]
pub struct ClusterSummary {
    pub id: ClusterId,
    pub cluster_type: String,
    pub name: String,
    pub track_count: i64,
}

/// Library statistics.
#[derive(Debug)]
pub struct LibraryStats {
    pub total_tracks: i64,
    pub total_releases: i64,
    pub total_artists: i64,
    pub total_clusters: i64,
    pub untagged_tracks: i64,
    /// (cluster type, number of clusters of that type)
    pub cluster_types: Vec<(String, i64)>,
}
