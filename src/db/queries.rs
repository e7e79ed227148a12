use super::models::{
    ArtistId, ClusterId, ClusterSummary, LibraryStats, NewTrack, ReleaseId, TrackId,
};
use super::{Database, Result};
use rusqlite::{params, Connection, OptionalExtension};

impl Database {
    /// Find or create a release by name.
    pub fn ensure_release(&self, name: &str) -> Result<ReleaseId> {
        ensure_release(&self.conn, name)
    }

    /// Find or create an artist by name.
    pub fn ensure_artist(&self, name: &str) -> Result<ArtistId> {
        ensure_artist(&self.conn, name)
    }

    /// Find or create the cluster `name` in namespace `cluster_type`.
    pub fn ensure_cluster(&self, cluster_type: &str, name: &str) -> Result<ClusterId> {
        ensure_cluster(&self.conn, cluster_type, name)
    }

    /// Insert or update a track keyed by file path. Returns the track id.
    pub fn upsert_track(&self, t: &NewTrack) -> Result<TrackId> {
        upsert_track(&self.conn, t)
    }

    /// Replace the artist set of a track.
    pub fn set_track_artists(&self, track_id: TrackId, artists: &[ArtistId]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        set_track_artists(&tx, track_id, artists)?;
        tx.commit()?;
        Ok(())
    }

    /// Replace the cluster set of a track.
    pub fn set_track_clusters(&self, track_id: TrackId, clusters: &[ClusterId]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        set_track_clusters(&tx, track_id, clusters)?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a track. Its artist and cluster links go with it.
    /// Returns false if no such track existed.
    pub fn delete_track(&self, track_id: TrackId) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM tracks WHERE id = ?1", params![track_id])?;
        Ok(n > 0)
    }

    /// Remove releases, artists and clusters that no longer have any track.
    pub fn prune_orphans(&self) -> Result<usize> {
        prune_orphans(&self.conn)
    }

    /// List clusters with their member counts, optionally restricted to one type.
    pub fn list_clusters(&self, cluster_type: Option<&str>) -> Result<Vec<ClusterSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, ct.name, c.name, COUNT(tc.track_id)
             FROM clusters c
             JOIN cluster_types ct ON ct.id = c.cluster_type_id
             LEFT JOIN track_clusters tc ON tc.cluster_id = c.id
             WHERE ?1 IS NULL OR ct.name = UPPER(?1)
             GROUP BY c.id
             ORDER BY ct.name, COUNT(tc.track_id) DESC, c.name",
        )?;

        let clusters = stmt
            .query_map(params![cluster_type], |row| {
                Ok(ClusterSummary {
                    id: row.get(0)?,
                    cluster_type: row.get(1)?,
                    name: row.get(2)?,
                    track_count: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(clusters)
    }

    /// Get library statistics.
    pub fn stats(&self) -> Result<LibraryStats> {
        let count = |sql: &str| -> Result<i64> { Ok(self.conn.query_row(sql, [], |r| r.get(0))?) };

        let total_tracks = count("SELECT COUNT(*) FROM tracks")?;
        let total_releases = count("SELECT COUNT(*) FROM releases")?;
        let total_artists = count("SELECT COUNT(*) FROM artists")?;
        let total_clusters = count("SELECT COUNT(*) FROM clusters")?;
        let untagged_tracks = count(
            "SELECT COUNT(*) FROM tracks t
             WHERE NOT EXISTS (SELECT 1 FROM track_clusters tc WHERE tc.track_id = t.id)",
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT ct.name, COUNT(c.id)
             FROM cluster_types ct
             LEFT JOIN clusters c ON c.cluster_type_id = ct.id
             GROUP BY ct.id
             ORDER BY ct.name",
        )?;
        let cluster_types = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(LibraryStats {
            total_tracks,
            total_releases,
            total_artists,
            total_clusters,
            untagged_tracks,
            cluster_types,
        })
    }
}

pub(crate) fn ensure_release(conn: &Connection, name: &str) -> Result<ReleaseId> {
    conn.execute(
        "INSERT INTO releases (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        params![name],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM releases WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?)
}

pub(crate) fn ensure_artist(conn: &Connection, name: &str) -> Result<ArtistId> {
    conn.execute(
        "INSERT INTO artists (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        params![name],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM artists WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?)
}

pub(crate) fn ensure_cluster(conn: &Connection, cluster_type: &str, name: &str) -> Result<ClusterId> {
    let cluster_type = cluster_type.to_uppercase();
    conn.execute(
        "INSERT INTO cluster_types (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        params![cluster_type],
    )?;
    let type_id: i64 = conn.query_row(
        "SELECT id FROM cluster_types WHERE name = ?1",
        params![cluster_type],
        |row| row.get(0),
    )?;

    conn.execute(
        "INSERT INTO clusters (cluster_type_id, name) VALUES (?1, ?2)
         ON CONFLICT(cluster_type_id, name) DO NOTHING",
        params![type_id, name],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM clusters WHERE cluster_type_id = ?1 AND name = ?2",
        params![type_id, name],
        |row| row.get(0),
    )?)
}

pub(crate) fn upsert_track(conn: &Connection, t: &NewTrack) -> Result<TrackId> {
    conn.execute(
        "INSERT INTO tracks (file_path, title, release_id, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(file_path) DO UPDATE SET
            title = excluded.title,
            release_id = excluded.release_id,
            updated_at = datetime('now')",
        params![t.file_path, t.title, t.release_id],
    )?;

    Ok(conn.query_row(
        "SELECT id FROM tracks WHERE file_path = ?1",
        params![t.file_path],
        |row| row.get(0),
    )?)
}

/// Look up a track id by file path.
pub(crate) fn track_id_by_path(conn: &Connection, file_path: &str) -> Result<Option<TrackId>> {
    Ok(conn
        .query_row(
            "SELECT id FROM tracks WHERE file_path = ?1",
            params![file_path],
            |row| row.get(0),
        )
        .optional()?)
}

/// Replace a track's artist links. Call inside a transaction.
pub(crate) fn set_track_artists(
    conn: &Connection,
    track_id: TrackId,
    artists: &[ArtistId],
) -> Result<()> {
    conn.execute("DELETE FROM track_artists WHERE track_id = ?1", params![track_id])?;
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO track_artists (track_id, artist_id) VALUES (?1, ?2)",
    )?;
    for artist_id in artists {
        stmt.execute(params![track_id, artist_id])?;
    }
    Ok(())
}

/// Replace a track's cluster links. Call inside a transaction.
pub(crate) fn set_track_clusters(
    conn: &Connection,
    track_id: TrackId,
    clusters: &[ClusterId],
) -> Result<()> {
    conn.execute("DELETE FROM track_clusters WHERE track_id = ?1", params![track_id])?;
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO track_clusters (track_id, cluster_id) VALUES (?1, ?2)",
    )?;
    for cluster_id in clusters {
        stmt.execute(params![track_id, cluster_id])?;
    }
    Ok(())
}

pub(crate) fn prune_orphans(conn: &Connection) -> Result<usize> {
    let mut removed = 0;
    removed += conn.execute(
        "DELETE FROM clusters
         WHERE NOT EXISTS (SELECT 1 FROM track_clusters tc WHERE tc.cluster_id = clusters.id)",
        [],
    )?;
    removed += conn.execute(
        "DELETE FROM artists
         WHERE NOT EXISTS (SELECT 1 FROM track_artists ta WHERE ta.artist_id = artists.id)",
        [],
    )?;
    removed += conn.execute(
        "DELETE FROM releases
         WHERE NOT EXISTS (SELECT 1 FROM tracks t WHERE t.release_id = releases.id)",
        [],
    )?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_track(path: &str, release_id: Option<ReleaseId>) -> NewTrack {
        NewTrack {
            file_path: path.to_string(),
            title: Some("Scarlet Begonias".to_string()),
            release_id,
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let t = test_track("/music/gd1977-05-08d1t01.flac", None);
        let id1 = db.upsert_track(&t).unwrap();
        let id2 = db.upsert_track(&t).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(db.stats().unwrap().total_tracks, 1);
    }

    #[test]
    fn test_upsert_updates_release() {
        let db = Database::open_in_memory().unwrap();
        let r1 = db.ensure_release("Cornell 5/8/77").unwrap();
        let r2 = db.ensure_release("Europe '72").unwrap();
        let id = db.upsert_track(&test_track("/music/a.flac", Some(r1))).unwrap();
        db.upsert_track(&test_track("/music/a.flac", Some(r2))).unwrap();

        let release: Option<ReleaseId> = db
            .conn
            .query_row("SELECT release_id FROM tracks WHERE id = ?1", params![id], |r| r.get(0))
            .unwrap();
        assert_eq!(release, Some(r2));
    }

    #[test]
    fn test_ensure_entities_dedup() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.ensure_release("R").unwrap(), db.ensure_release("R").unwrap());
        assert_eq!(db.ensure_artist("A").unwrap(), db.ensure_artist("A").unwrap());

        let rock = db.ensure_cluster("GENRE", "Rock").unwrap();
        assert_eq!(rock, db.ensure_cluster("genre", "Rock").unwrap());
        // Same name in another namespace is a different cluster
        assert_ne!(rock, db.ensure_cluster("MOOD", "Rock").unwrap());
    }

    #[test]
    fn test_track_id_by_path() {
        let db = Database::open_in_memory().unwrap();
        let id = db.upsert_track(&test_track("/music/a.flac", None)).unwrap();
        assert_eq!(track_id_by_path(&db.conn, "/music/a.flac").unwrap(), Some(id));
        assert_eq!(track_id_by_path(&db.conn, "/nonexistent").unwrap(), None);
    }

    #[test]
    fn test_delete_track_cascades_links() {
        let db = Database::open_in_memory().unwrap();
        let id = db.upsert_track(&test_track("/music/a.flac", None)).unwrap();
        let artist = db.ensure_artist("Grateful Dead").unwrap();
        let rock = db.ensure_cluster("GENRE", "Rock").unwrap();
        db.set_track_artists(id, &[artist]).unwrap();
        db.set_track_clusters(id, &[rock]).unwrap();

        assert!(db.delete_track(id).unwrap());
        assert!(!db.delete_track(id).unwrap());

        let links: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM track_clusters", [], |r| r.get(0))
            .unwrap();
        assert_eq!(links, 0);

        // Artist and cluster are now orphans
        assert_eq!(db.prune_orphans().unwrap(), 2);
        let stats = db.stats().unwrap();
        assert_eq!(stats.total_artists, 0);
        assert_eq!(stats.total_clusters, 0);
    }

    #[test]
    fn test_set_track_clusters_replaces() {
        let db = Database::open_in_memory().unwrap();
        let id = db.upsert_track(&test_track("/music/a.flac", None)).unwrap();
        let rock = db.ensure_cluster("GENRE", "Rock").unwrap();
        let jazz = db.ensure_cluster("GENRE", "Jazz").unwrap();

        db.set_track_clusters(id, &[rock, rock]).unwrap();
        db.set_track_clusters(id, &[jazz]).unwrap();

        let clusters = db.list_clusters(Some("genre")).unwrap();
        let jazz_row = clusters.iter().find(|c| c.id == jazz).unwrap();
        let rock_row = clusters.iter().find(|c| c.id == rock).unwrap();
        assert_eq!(jazz_row.track_count, 1);
        assert_eq!(rock_row.track_count, 0);
        // Sorted by member count within the type
        assert_eq!(clusters[0].id, jazz);
    }

    #[test]
    fn test_stats() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.total_tracks, 0);
        assert!(stats.cluster_types.is_empty());

        let a = db.upsert_track(&test_track("/music/a.flac", None)).unwrap();
        db.upsert_track(&test_track("/music/b.flac", None)).unwrap();
        let rock = db.ensure_cluster("GENRE", "Rock").unwrap();
        db.ensure_cluster("MOOD", "Calm").unwrap();
        db.set_track_clusters(a, &[rock]).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_tracks, 2);
        assert_eq!(stats.untagged_tracks, 1);
        assert_eq!(stats.total_clusters, 2);
        assert_eq!(
            stats.cluster_types,
            vec![("GENRE".to_string(), 1), ("MOOD".to_string(), 1)]
        );
    }
}
