pub mod catalog;
pub mod config;
pub mod db;
pub mod import;
pub mod similarity;

pub use catalog::{Catalog, CatalogSnapshot};
pub use similarity::{get_similar_artists, get_similar_releases, get_similar_tracks};

/// Application name for XDG paths
pub const APP_NAME: &str = "tagsift";
