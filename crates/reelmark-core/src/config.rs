use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ReelmarkError;
use crate::library::{Bucket, SortKey};

/// Commented template written by `config init`.
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Media catalog (TMDB v3) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub image_base_url: String,
    /// v4 read access token, sent as a bearer token.
    pub api_token: Option<String>,
    pub language: String,
    pub include_adult: bool,
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3/".into(),
            image_base_url: "https://image.tmdb.org/t/p/".into(),
            api_token: None,
            language: "en-US".into(),
            include_adult: false,
            timeout_secs: 15,
        }
    }
}

impl CatalogConfig {
    /// Full image URL for a catalog path such as `/abc.jpg`.
    pub fn image_url(&self, size: &str, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.image_base_url.trim_end_matches('/'),
            size,
            path.trim_start_matches('/')
        )
    }
}

/// Hosted backend (auth, row store, object store) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    /// Public project key sent as the `apikey` header.
    pub anon_key: String,
    pub watchlist_table: String,
    pub avatar_bucket: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            watchlist_table: "watchlist".into(),
            avatar_bucket: "avatars".into(),
        }
    }
}

impl BackendConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub page_size: usize,
    pub default_filter: Bucket,
    pub default_sort: SortKey,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            default_filter: Bucket::All,
            default_sort: SortKey::AddedDate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Also write a daily-rotated log file under the data directory.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: false,
        }
    }
}

impl AppConfig {
    /// Load the user config file, or defaults if there is none.
    ///
    /// Missing sections and keys fall back to their defaults.
    pub fn load() -> Result<Self, ReelmarkError> {
        let user_path = Self::config_path();
        if user_path.exists() {
            Self::load_from(&user_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ReelmarkError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ReelmarkError::Config(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ReelmarkError::Config(e.to_string()))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), ReelmarkError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ReelmarkError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ReelmarkError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Write the commented template unless a config file already exists.
    /// Returns `false` if the file was left alone.
    pub fn init_template() -> Result<bool, ReelmarkError> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, DEFAULT_CONFIG)?;
        Ok(true)
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Path to the local database file.
    pub fn db_path() -> PathBuf {
        Self::data_dir().join("reelmark.db")
    }

    /// Ensure the data directory exists and return the DB path.
    pub fn ensure_db_path() -> Result<PathBuf, ReelmarkError> {
        let path = Self::db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    /// Directory for rotated log files.
    pub fn log_dir() -> PathBuf {
        Self::data_dir().join("logs")
    }

    fn data_dir() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "reelmark")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_matches_defaults() {
        let parsed: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed, AppConfig::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [library]
            page_size = 5
            default_sort = "rating"
            "#,
        )
        .unwrap();
        assert_eq!(config.library.page_size, 5);
        assert_eq!(config.library.default_sort, SortKey::Rating);
        assert_eq!(config.library.default_filter, Bucket::All);
        assert_eq!(config.catalog.language, "en-US");
        assert_eq!(config.backend.watchlist_table, "watchlist");
        assert!(!config.backend.is_configured());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.backend.url = "https://example.supabase.co".into();
        config.backend.anon_key = "anon".into();
        config.catalog.api_token = Some("token".into());
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.backend.is_configured());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[library]\npage_size = \"many\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ReelmarkError::Config(_))
        ));
    }

    #[test]
    fn test_image_url() {
        let catalog = CatalogConfig::default();
        assert_eq!(
            catalog.image_url("w342", "/poster.jpg"),
            "https://image.tmdb.org/t/p/w342/poster.jpg"
        );
    }
}
