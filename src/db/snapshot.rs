//! Read-only snapshot over the catalog.
//!
//! A [`ReadSnapshot`] holds one deferred SQLite transaction. In WAL mode every
//! statement run through it sees the database as of the snapshot's first read,
//! no matter what other connections commit meanwhile. Dropping the snapshot
//! rolls the transaction back, which releases it on every exit path.

use super::models::{
    ArtistHandle, ArtistId, ClusterHandle, ClusterId, ReleaseHandle, ReleaseId, TrackHandle,
    TrackId,
};
use super::{Database, Result};
use crate::catalog::{Catalog, CatalogSnapshot};
use rusqlite::types::FromSql;
use rusqlite::{params, OptionalExtension, ToSql, Transaction, TransactionBehavior};
use std::collections::BTreeSet;

pub struct ReadSnapshot<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> ReadSnapshot<'conn> {
    fn begin(db: &'conn Database) -> Result<Self> {
        let tx = Transaction::new_unchecked(&db.conn, TransactionBehavior::Deferred)?;
        // A deferred transaction only pins its snapshot on the first read
        let _: i64 = tx.query_row("SELECT COUNT(*) FROM sqlite_master", [], |r| r.get(0))?;
        Ok(Self { tx })
    }

    /// Run a single-column query and collect the ids into a set.
    fn id_set<T: FromSql + Ord>(&self, sql: &str, key: impl ToSql) -> Result<BTreeSet<T>> {
        let mut stmt = self.tx.prepare_cached(sql)?;
        let ids = stmt
            .query_map(params![key], |row| row.get(0))?
            .collect::<std::result::Result<BTreeSet<T>, _>>()?;
        Ok(ids)
    }
}

impl Catalog for Database {
    type Snapshot<'a>
        = ReadSnapshot<'a>
    where
        Self: 'a;

    fn begin_read_snapshot(&self) -> Result<ReadSnapshot<'_>> {
        ReadSnapshot::begin(self)
    }
}

impl CatalogSnapshot for ReadSnapshot<'_> {
    fn resolve_track(&self, id: TrackId) -> Result<Option<TrackHandle>> {
        let row: Option<(String, Option<String>, Option<ReleaseId>)> = self
            .tx
            .prepare_cached("SELECT file_path, title, release_id FROM tracks WHERE id = ?1")?
            .query_row(params![id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .optional()?;

        let Some((file_path, title, release)) = row else {
            return Ok(None);
        };

        Ok(Some(TrackHandle {
            id,
            file_path,
            title,
            release,
            artists: self.id_set("SELECT artist_id FROM track_artists WHERE track_id = ?1", id)?,
            clusters: self.id_set("SELECT cluster_id FROM track_clusters WHERE track_id = ?1", id)?,
        }))
    }

    fn resolve_release(&self, id: ReleaseId) -> Result<Option<ReleaseHandle>> {
        let name: Option<String> = self
            .tx
            .prepare_cached("SELECT name FROM releases WHERE id = ?1")?
            .query_row(params![id], |row| row.get(0))
            .optional()?;

        let Some(name) = name else {
            return Ok(None);
        };

        Ok(Some(ReleaseHandle {
            id,
            name,
            track_ids: self.id_set("SELECT id FROM tracks WHERE release_id = ?1", id)?,
        }))
    }

    fn resolve_artist(&self, id: ArtistId) -> Result<Option<ArtistHandle>> {
        let name: Option<String> = self
            .tx
            .prepare_cached("SELECT name FROM artists WHERE id = ?1")?
            .query_row(params![id], |row| row.get(0))
            .optional()?;

        let Some(name) = name else {
            return Ok(None);
        };

        Ok(Some(ArtistHandle {
            id,
            name,
            track_ids: self.id_set("SELECT track_id FROM track_artists WHERE artist_id = ?1", id)?,
        }))
    }

    fn resolve_cluster(&self, id: ClusterId) -> Result<Option<ClusterHandle>> {
        let row: Option<(String, String)> = self
            .tx
            .prepare_cached(
                "SELECT ct.name, c.name
                 FROM clusters c
                 JOIN cluster_types ct ON ct.id = c.cluster_type_id
                 WHERE c.id = ?1",
            )?
            .query_row(params![id], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((cluster_type, name)) = row else {
            return Ok(None);
        };

        Ok(Some(ClusterHandle {
            id,
            cluster_type,
            name,
            member_track_ids: self
                .id_set("SELECT track_id FROM track_clusters WHERE cluster_id = ?1", id)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewTrack;

    fn seed(db: &Database) -> (TrackId, TrackId, ReleaseId, ArtistId, ClusterId) {
        let release = db.ensure_release("Blues for Allah").unwrap();
        let t1 = db
            .upsert_track(&NewTrack {
                file_path: "/music/t1.flac".into(),
                title: Some("Help on the Way".into()),
                release_id: Some(release),
            })
            .unwrap();
        let t2 = db
            .upsert_track(&NewTrack {
                file_path: "/music/t2.flac".into(),
                title: None,
                release_id: None,
            })
            .unwrap();
        let artist = db.ensure_artist("Grateful Dead").unwrap();
        let rock = db.ensure_cluster("GENRE", "Rock").unwrap();
        db.set_track_artists(t1, &[artist]).unwrap();
        db.set_track_clusters(t1, &[rock]).unwrap();
        db.set_track_clusters(t2, &[rock]).unwrap();
        (t1, t2, release, artist, rock)
    }

    #[test]
    fn test_resolve_entities() {
        let db = Database::open_in_memory().unwrap();
        let (t1, t2, release, artist, rock) = seed(&db);
        let snap = db.begin_read_snapshot().unwrap();

        let track = snap.resolve_track(t1).unwrap().unwrap();
        assert_eq!(track.release, Some(release));
        assert_eq!(track.artists, BTreeSet::from([artist]));
        assert_eq!(track.clusters, BTreeSet::from([rock]));
        assert_eq!(track.display_name(), "Help on the Way");

        let r = snap.resolve_release(release).unwrap().unwrap();
        assert_eq!(r.name, "Blues for Allah");
        assert_eq!(r.track_ids, BTreeSet::from([t1]));

        let a = snap.resolve_artist(artist).unwrap().unwrap();
        assert_eq!(a.track_ids, BTreeSet::from([t1]));

        let c = snap.resolve_cluster(rock).unwrap().unwrap();
        assert_eq!(c.cluster_type, "GENRE");
        assert_eq!(c.name, "Rock");
        assert_eq!(c.member_track_ids, BTreeSet::from([t1, t2]));
    }

    #[test]
    fn test_resolve_missing_is_none() {
        let db = Database::open_in_memory().unwrap();
        let snap = db.begin_read_snapshot().unwrap();
        assert!(snap.resolve_track(TrackId(99)).unwrap().is_none());
        assert!(snap.resolve_release(ReleaseId(99)).unwrap().is_none());
        assert!(snap.resolve_artist(ArtistId(99)).unwrap().is_none());
        assert!(snap.resolve_cluster(ClusterId(99)).unwrap().is_none());
    }

    #[test]
    fn test_snapshot_released_on_drop() {
        let db = Database::open_in_memory().unwrap();
        {
            let _snap = db.begin_read_snapshot().unwrap();
            assert!(!db.conn.is_autocommit());
        }
        assert!(db.conn.is_autocommit());
        // Writes work again once the snapshot is gone
        db.ensure_artist("Phish").unwrap();
    }
}
