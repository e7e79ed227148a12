//! Tag-cluster similarity.
//!
//! Tracks are similar when they share clusters with the seed tracks. Seeds are
//! expanded to the clusters they belong to, clusters are ranked by how many
//! seed memberships point at them, and candidates are pulled from the ranked
//! clusters in order. Release and artist queries run the same pipeline over
//! the release's or artist's own tracks and project the candidates back onto
//! releases or artists.
//!
//! Every public entry point runs inside a single read snapshot.

use crate::catalog::{Catalog, CatalogSnapshot};
use crate::db::Result;
use crate::db::models::{ArtistId, ClusterId, ReleaseId, TrackId};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

/// How many candidate tracks to fetch per requested release or artist.
/// Many candidates collapse onto the same release/artist during projection.
pub const OVER_FETCH_FACTOR: usize = 5;

/// Cluster ids in seed order, one entry per (seed track, cluster) membership.
/// Duplicates are the frequency signal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterOccurrences(Vec<ClusterId>);

impl ClusterOccurrences {
    pub fn as_slice(&self) -> &[ClusterId] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Distinct clusters, most frequent first. Ties keep first-occurrence order.
    pub fn rank(&self) -> RankedClusters {
        let mut counts: HashMap<ClusterId, usize> = HashMap::new();
        let mut distinct = Vec::new();
        for &id in &self.0 {
            let count = counts.entry(id).or_insert(0);
            if *count == 0 {
                distinct.push(id);
            }
            *count += 1;
        }

        // Stable sort over first-occurrence order
        distinct.sort_by(|a, b| counts[b].cmp(&counts[a]));
        RankedClusters(distinct)
    }
}

impl FromIterator<ClusterId> for ClusterOccurrences {
    fn from_iter<I: IntoIterator<Item = ClusterId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Distinct cluster ids in descending frequency order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedClusters(Vec<ClusterId>);

impl RankedClusters {
    pub fn as_slice(&self) -> &[ClusterId] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = ClusterId> + '_ {
        self.0.iter().copied()
    }
}

/// A bounded sequence that keeps the first occurrence of each item.
///
/// Pushing stops being accepted once `limit` items are held, so the length
/// can never exceed the limit no matter how many items are offered.
#[derive(Debug, Clone)]
pub struct FirstSeen<T> {
    items: Vec<T>,
    seen: HashSet<T>,
    limit: usize,
}

impl<T: Copy + Eq + Hash> FirstSeen<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
            limit,
        }
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.limit
    }

    /// Append `item` unless the sequence is full or already holds it.
    /// Returns whether it was appended.
    pub fn push(&mut self, item: T) -> bool {
        if self.is_full() || !self.seen.insert(item) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Push items in order until the sequence is full.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            if self.is_full() {
                break;
            }
            self.push(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

/// Map seed tracks to the clusters they belong to.
/// Tracks that no longer exist contribute nothing.
pub fn expand_seeds<S: CatalogSnapshot + ?Sized>(
    snapshot: &S,
    seeds: &BTreeSet<TrackId>,
) -> Result<ClusterOccurrences> {
    let mut clusters = Vec::new();
    for &track_id in seeds {
        match snapshot.resolve_track(track_id)? {
            Some(track) => clusters.extend(track.clusters.iter().copied()),
            None => log::debug!("Seed track {} not found, skipping", track_id),
        }
    }
    Ok(ClusterOccurrences(clusters))
}

/// Pull member tracks from `clusters` in order, skipping `exclude`, until
/// `max_count` distinct tracks are collected or the clusters run out.
pub fn collect_candidates<S: CatalogSnapshot + ?Sized>(
    snapshot: &S,
    clusters: &RankedClusters,
    exclude: &BTreeSet<TrackId>,
    max_count: usize,
) -> Result<Vec<TrackId>> {
    let mut candidates = FirstSeen::new(max_count);
    for cluster_id in clusters.iter() {
        if candidates.is_full() {
            break;
        }
        let Some(cluster) = snapshot.resolve_cluster(cluster_id)? else {
            continue;
        };
        candidates.extend(cluster.member_track_ids.difference(exclude).copied());
    }
    Ok(candidates.into_vec())
}

/// The track pipeline, run against an already-open snapshot.
fn similar_tracks_in<S: CatalogSnapshot + ?Sized>(
    snapshot: &S,
    seeds: &BTreeSet<TrackId>,
    max_count: usize,
) -> Result<Vec<TrackId>> {
    if seeds.is_empty() || max_count == 0 {
        return Ok(Vec::new());
    }

    let occurrences = expand_seeds(snapshot, seeds)?;
    let ranked = occurrences.rank();
    let candidates = collect_candidates(snapshot, &ranked, seeds, max_count)?;

    log::debug!(
        "{} seeds -> {} cluster memberships -> {} clusters -> {} candidates",
        seeds.len(),
        occurrences.as_slice().len(),
        ranked.as_slice().len(),
        candidates.len()
    );
    Ok(candidates)
}

/// Tracks sharing the most clusters with `seeds`, never including a seed.
pub fn get_similar_tracks<C: Catalog + ?Sized>(
    catalog: &C,
    seeds: &BTreeSet<TrackId>,
    max_count: usize,
) -> Result<Vec<TrackId>> {
    if seeds.is_empty() || max_count == 0 {
        return Ok(Vec::new());
    }
    let snapshot = catalog.begin_read_snapshot()?;
    similar_tracks_in(&snapshot, seeds, max_count)
}

/// Releases whose tracks share clusters with the tracks of `release_id`.
/// An unknown release yields an empty list.
pub fn get_similar_releases<C: Catalog + ?Sized>(
    catalog: &C,
    release_id: ReleaseId,
    max_count: usize,
) -> Result<Vec<ReleaseId>> {
    if max_count == 0 {
        return Ok(Vec::new());
    }
    let snapshot = catalog.begin_read_snapshot()?;

    let Some(release) = snapshot.resolve_release(release_id)? else {
        log::debug!("Release {} not found", release_id);
        return Ok(Vec::new());
    };

    let candidates = similar_tracks_in(
        &snapshot,
        &release.track_ids,
        max_count.saturating_mul(OVER_FETCH_FACTOR),
    )?;

    let mut releases = FirstSeen::new(max_count);
    for track_id in candidates {
        if releases.is_full() {
            break;
        }
        let Some(track) = snapshot.resolve_track(track_id)? else {
            continue;
        };
        match track.release {
            Some(other) if other != release_id => {
                releases.push(other);
            }
            _ => {}
        }
    }
    Ok(releases.into_vec())
}

/// Artists whose tracks share clusters with the tracks of `artist_id`.
/// An unknown artist yields an empty list.
pub fn get_similar_artists<C: Catalog + ?Sized>(
    catalog: &C,
    artist_id: ArtistId,
    max_count: usize,
) -> Result<Vec<ArtistId>> {
    if max_count == 0 {
        return Ok(Vec::new());
    }
    let snapshot = catalog.begin_read_snapshot()?;

    let Some(artist) = snapshot.resolve_artist(artist_id)? else {
        log::debug!("Artist {} not found", artist_id);
        return Ok(Vec::new());
    };

    let candidates = similar_tracks_in(
        &snapshot,
        &artist.track_ids,
        max_count.saturating_mul(OVER_FETCH_FACTOR),
    )?;

    let mut artists = FirstSeen::new(max_count);
    for track_id in candidates {
        if artists.is_full() {
            break;
        }
        let Some(track) = snapshot.resolve_track(track_id)? else {
            continue;
        };
        // A track can credit several artists; each one counts
        artists.extend(track.artists.into_iter().filter(|&a| a != artist_id));
    }
    Ok(artists.into_vec())
}
