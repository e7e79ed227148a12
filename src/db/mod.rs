pub mod models;
pub mod queries;
pub mod snapshot;

use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub use snapshot::ReadSnapshot;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration failed: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA_VERSION: i32 = 1;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        // WAL lets readers keep a stable snapshot while a writer commits
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version > SCHEMA_VERSION {
            return Err(DbError::Migration(format!(
                "database schema v{version} is newer than supported v{SCHEMA_VERSION}"
            )));
        }
        if version == SCHEMA_VERSION {
            return Ok(());
        }
        if version < 1 {
            self.migrate_v1()?;
        }

        self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// V1: catalog entities and their many-to-many link tables.
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS releases (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                name    TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS artists (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                name    TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS tracks (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path   TEXT NOT NULL UNIQUE,
                title       TEXT,
                release_id  INTEGER REFERENCES releases(id) ON DELETE SET NULL,

                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_tracks_release ON tracks(release_id);

            -- Track <-> Artist, keyed both ways
            CREATE TABLE IF NOT EXISTS track_artists (
                track_id    INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
                artist_id   INTEGER NOT NULL REFERENCES artists(id) ON DELETE CASCADE,
                PRIMARY KEY (track_id, artist_id)
            );
            CREATE INDEX IF NOT EXISTS idx_track_artists_artist ON track_artists(artist_id, track_id);

            CREATE TABLE IF NOT EXISTS cluster_types (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                name    TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS clusters (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                cluster_type_id INTEGER NOT NULL REFERENCES cluster_types(id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                UNIQUE(cluster_type_id, name)
            );

            -- Track <-> Cluster, keyed both ways
            CREATE TABLE IF NOT EXISTS track_clusters (
                track_id    INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
                cluster_id  INTEGER NOT NULL REFERENCES clusters(id) ON DELETE CASCADE,
                PRIMARY KEY (track_id, cluster_id)
            );
            CREATE INDEX IF NOT EXISTS idx_track_clusters_cluster ON track_clusters(cluster_id, track_id);
            ",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_sets_user_version() {
        let db = Database::open_in_memory().unwrap();
        let version: i32 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        assert!(matches!(db.migrate(), Err(DbError::Migration(_))));
    }

    #[test]
    fn test_open_on_disk_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("library.db");
        Database::open(&path).unwrap();
        assert!(path.exists());
    }
}
