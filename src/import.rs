//! Load a JSON library manifest into the catalog.
//!
//! Tag reading happens elsewhere; this takes its output, one entry per audio
//! file, and turns the tags whose key is a configured cluster type into
//! clusters.

use crate::db::models::{NewTrack, ReleaseId};
use crate::db::{queries, Database, DbError};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid manifest: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for ImportError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Db(DbError::from(e))
    }
}

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub tracks: Vec<ManifestTrack>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestTrack {
    pub path: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub artists: Vec<String>,
    /// Tag key (e.g. "GENRE") to values.
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default, PartialEq)]
pub struct ImportResult {
    pub new: u64,
    pub updated: u64,
    /// Entries without a usable path.
    pub skipped: u64,
    /// Distinct releases, artists and clusters referenced by this import.
    pub releases: usize,
    pub artists: usize,
    pub clusters: usize,
    /// Tag values dropped because their key is not a configured cluster type.
    pub ignored_tags: u64,
    /// Releases, artists and clusters left without tracks and removed.
    pub pruned: usize,
}

/// Read and import a manifest file.
pub fn import_manifest(
    db: &Database,
    path: &Path,
    cluster_types: &[String],
) -> std::result::Result<ImportResult, ImportError> {
    let contents = std::fs::read_to_string(path)?;
    let manifest: Manifest = serde_json::from_str(&contents)?;
    log::info!("Importing {} entries from {}", manifest.tracks.len(), path.display());
    import_tracks(db, &manifest, cluster_types)
}

/// Import manifest entries in a single transaction. Re-importing a path
/// replaces that track's release, artists and clusters.
pub fn import_tracks(
    db: &Database,
    manifest: &Manifest,
    cluster_types: &[String],
) -> std::result::Result<ImportResult, ImportError> {
    let allowed: HashSet<String> = cluster_types.iter().map(|t| t.to_uppercase()).collect();

    let pb = ProgressBar::new(manifest.tracks.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message("Importing...");

    let mut result = ImportResult::default();
    let mut releases = HashSet::new();
    let mut artists = HashSet::new();
    let mut clusters = HashSet::new();

    let tx = db.conn.unchecked_transaction()?;

    for entry in &manifest.tracks {
        pb.inc(1);

        let file_path = entry.path.trim();
        if file_path.is_empty() {
            log::warn!("Skipping manifest entry without a path");
            result.skipped += 1;
            continue;
        }

        let release_id: Option<ReleaseId> = match non_empty(entry.release.as_deref()) {
            Some(name) => Some(queries::ensure_release(&tx, name)?),
            None => None,
        };

        let is_new = queries::track_id_by_path(&tx, file_path)?.is_none();
        let track_id = queries::upsert_track(
            &tx,
            &NewTrack {
                file_path: file_path.to_string(),
                title: non_empty(entry.title.as_deref()).map(str::to_string),
                release_id,
            },
        )?;
        if is_new {
            result.new += 1;
        } else {
            result.updated += 1;
        }
        releases.extend(release_id);

        let mut artist_ids = Vec::with_capacity(entry.artists.len());
        for name in &entry.artists {
            if let Some(name) = non_empty(Some(name.as_str())) {
                artist_ids.push(queries::ensure_artist(&tx, name)?);
            }
        }
        queries::set_track_artists(&tx, track_id, &artist_ids)?;
        artists.extend(artist_ids.iter().copied());

        let mut cluster_ids = Vec::new();
        for (key, values) in &entry.tags {
            let cluster_type = key.trim().to_uppercase();
            if !allowed.contains(&cluster_type) {
                result.ignored_tags += values.len() as u64;
                continue;
            }
            for value in values {
                if let Some(value) = non_empty(Some(value.as_str())) {
                    cluster_ids.push(queries::ensure_cluster(&tx, &cluster_type, value)?);
                }
            }
        }
        queries::set_track_clusters(&tx, track_id, &cluster_ids)?;
        clusters.extend(cluster_ids.iter().copied());
    }

    result.pruned = queries::prune_orphans(&tx)?;
    tx.commit()?;

    result.releases = releases.len();
    result.artists = artists.len();
    result.clusters = clusters.len();

    pb.finish_with_message(format!(
        "Done: {} new, {} updated, {} skipped",
        result.new, result.updated, result.skipped
    ));

    Ok(result)
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
