use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Cluster types created from manifest tags when the config names none.
pub const DEFAULT_CLUSTER_TYPES: &[&str] = &["ALBUMGROUPING", "ALBUMMOOD", "GENRE", "MOOD"];

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults; the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Tag keys that become clusters on import. Matched case-insensitively.
    pub cluster_types: Vec<String>,
    /// Result count for similarity commands when `-n` is not given.
    pub default_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            cluster_types: DEFAULT_CLUSTER_TYPES.iter().map(|s| s.to_string()).collect(),
            default_limit: 20,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/tagsift/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Parse config text and normalize cluster type names to upper case.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        let mut config: AppConfig = toml::from_str(contents)?;
        for t in &mut config.cluster_types {
            *t = t.trim().to_uppercase();
        }
        config.cluster_types.retain(|t| !t.is_empty());
        config.cluster_types.sort();
        config.cluster_types.dedup();
        Ok(config)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("tagsift.db")
    } else {
        // Fallback: current directory
        PathBuf::from("tagsift.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert!(config.db_path.is_none());
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.cluster_types, DEFAULT_CLUSTER_TYPES);
    }

    #[test]
    fn test_cluster_types_normalized() {
        let config = AppConfig::parse(
            r#"
            db_path = "/tmp/lib.db"
            cluster_types = ["mood", " Genre ", "MOOD", ""]
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/lib.db")));
        assert_eq!(config.cluster_types, vec!["GENRE", "MOOD"]);
        assert_eq!(config.default_limit, 20);
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(AppConfig::parse("default_limit = \"lots\"").is_err());
    }
}
