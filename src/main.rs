use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tagsift::catalog::{Catalog, CatalogSnapshot};
use tagsift::db::models::{ArtistId, ReleaseId, TrackId};

#[derive(Parser)]
#[command(name = "tagsift", version, about = "Tag-cluster similarity for a music library")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import tracks, releases, artists and tags from a JSON manifest
    Import {
        /// Manifest file
        manifest: PathBuf,
    },

    /// Find tracks sharing tags with the given tracks
    SimilarTracks {
        /// Seed track ids
        #[arg(required = true)]
        tracks: Vec<TrackId>,

        /// Number of results (defaults to config default_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Find releases whose tracks share tags with a release
    SimilarReleases {
        release: ReleaseId,

        /// Number of results (defaults to config default_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Find artists whose tracks share tags with an artist
    SimilarArtists {
        artist: ArtistId,

        /// Number of results (defaults to config default_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// List clusters with their track counts
    Clusters {
        /// Only show clusters of this type (e.g. GENRE)
        #[arg(short = 't', long = "type")]
        cluster_type: Option<String>,
    },

    /// Show library statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = tagsift::config::AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli
        .db_path
        .or(config.db_path.clone())
        .unwrap_or_else(tagsift::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = tagsift::db::Database::open(&db_path).context("Failed to open database")?;

    match cli.command {
        Commands::Import { manifest } => {
            let result = tagsift::import::import_manifest(&db, &manifest, &config.cluster_types)
                .with_context(|| format!("Import of {} failed", manifest.display()))?;
            println!(
                "Import complete: {} new, {} updated, {} skipped, {} pruned",
                result.new, result.updated, result.skipped, result.pruned
            );
            println!(
                "Referenced {} releases, {} artists, {} clusters ({} tag values ignored)",
                result.releases, result.artists, result.clusters, result.ignored_tags
            );
        }

        Commands::SimilarTracks { tracks, limit } => {
            let seeds: BTreeSet<TrackId> = tracks.into_iter().collect();
            let limit = limit.unwrap_or(config.default_limit);
            let results =
                tagsift::get_similar_tracks(&db, &seeds, limit).context("Query failed")?;

            if results.is_empty() {
                println!("No similar tracks found.");
                return Ok(());
            }

            let snapshot = db.begin_read_snapshot().context("Query failed")?;
            println!("{:>8}  Track", "Id");
            println!("{}", "-".repeat(60));
            for id in results {
                let name = snapshot
                    .resolve_track(id)?
                    .map(|t| t.display_name().to_string())
                    .unwrap_or_default();
                println!("{:>8}  {}", id, name);
            }
        }

        Commands::SimilarReleases { release, limit } => {
            let limit = limit.unwrap_or(config.default_limit);
            let results =
                tagsift::get_similar_releases(&db, release, limit).context("Query failed")?;

            if results.is_empty() {
                println!("No similar releases found for release {}.", release);
                return Ok(());
            }

            let snapshot = db.begin_read_snapshot().context("Query failed")?;
            println!("{:>8}  Release", "Id");
            println!("{}", "-".repeat(60));
            for id in results {
                let name = snapshot.resolve_release(id)?.map(|r| r.name).unwrap_or_default();
                println!("{:>8}  {}", id, name);
            }
        }

        Commands::SimilarArtists { artist, limit } => {
            let limit = limit.unwrap_or(config.default_limit);
            let results =
                tagsift::get_similar_artists(&db, artist, limit).context("Query failed")?;

            if results.is_empty() {
                println!("No similar artists found for artist {}.", artist);
                return Ok(());
            }

            let snapshot = db.begin_read_snapshot().context("Query failed")?;
            println!("{:>8}  Artist", "Id");
            println!("{}", "-".repeat(60));
            for id in results {
                let name = snapshot.resolve_artist(id)?.map(|a| a.name).unwrap_or_default();
                println!("{:>8}  {}", id, name);
            }
        }

        Commands::Clusters { cluster_type } => {
            let clusters = db
                .list_clusters(cluster_type.as_deref())
                .context("Failed to list clusters")?;

            if clusters.is_empty() {
                println!("No clusters found.");
                return Ok(());
            }

            println!("{:>8}  {:<16} {:<30} {:>6}", "Id", "Type", "Name", "Tracks");
            println!("{}", "-".repeat(64));
            for c in &clusters {
                println!(
                    "{:>8}  {:<16} {:<30} {:>6}",
                    c.id, c.cluster_type, c.name, c.track_count
                );
            }
        }

        Commands::Stats => {
            let stats = db.stats().context("Failed to get stats")?;
            println!("Library Statistics");
            println!("==================");
            println!("Tracks:           {}", stats.total_tracks);
            println!("  untagged:       {}", stats.untagged_tracks);
            println!("Releases:         {}", stats.total_releases);
            println!("Artists:          {}", stats.total_artists);
            println!("Clusters:         {}", stats.total_clusters);
            println!();

            if !stats.cluster_types.is_empty() {
                println!("Cluster types:");
                for (name, count) in &stats.cluster_types {
                    println!("  {:<16} {}", name, count);
                }
            }
        }
    }

    Ok(())
}
