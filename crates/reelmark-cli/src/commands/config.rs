use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Subcommand};
use serde_json::json;

use reelmark_core::config::AppConfig;

use super::{parse_bucket, parse_sort};
use crate::output::Output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (secrets masked)
    Show {
        /// Print secrets in full
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },
    /// Print config, database and log locations
    Path,
    /// Write a commented config file if there is none
    Init,
    /// Change one setting, e.g. `catalog.api_token <token>`
    Set { key: String, value: String },
}

pub fn run(cmd: ConfigCommands, mut config: AppConfig, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show { full } => {
            let shown = if full { config } else { masked(config) };
            output.println(toml::to_string_pretty(&shown)?);
            output.json(&shown);
        }
        ConfigCommands::Path => {
            let config_path = AppConfig::config_path();
            let db_path = AppConfig::db_path();
            let log_dir = AppConfig::log_dir();
            output.println(format!("Config:   {}", config_path.display()));
            output.println(format!("Database: {}", db_path.display()));
            output.println(format!("Logs:     {}", log_dir.display()));
            output.json(&json!({
                "config": config_path,
                "database": db_path,
                "logs": log_dir,
            }));
        }
        ConfigCommands::Init => {
            let path = AppConfig::config_path();
            if AppConfig::init_template()? {
                output.success(format!("Wrote {}", path.display()));
            } else {
                output.info(format!("{} already exists; left unchanged", path.display()));
            }
        }
        ConfigCommands::Set { key, value } => {
            set_key(&mut config, &key, &value)?;
            config.save()?;
            tracing::info!(%key, "Config updated");
            output.success(format!("Set {key}"));
        }
    }
    Ok(())
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}…")
}

fn masked(mut config: AppConfig) -> AppConfig {
    config.catalog.api_token = config.catalog.api_token.as_deref().map(mask);
    config.backend.anon_key = mask(&config.backend.anon_key);
    config
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("expected true or false, got '{value}'"),
    }
}

fn set_key(config: &mut AppConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "catalog.base_url" => config.catalog.base_url = value.to_string(),
        "catalog.image_base_url" => config.catalog.image_base_url = value.to_string(),
        "catalog.api_token" => {
            config.catalog.api_token = Some(value.to_string()).filter(|v| !v.is_empty())
        }
        "catalog.language" => config.catalog.language = value.to_string(),
        "catalog.include_adult" => config.catalog.include_adult = parse_bool(value)?,
        "catalog.timeout_secs" => {
            config.catalog.timeout_secs = value.parse().context("timeout_secs")?
        }
        "backend.url" => config.backend.url = value.to_string(),
        "backend.anon_key" => config.backend.anon_key = value.to_string(),
        "backend.watchlist_table" => config.backend.watchlist_table = value.to_string(),
        "backend.avatar_bucket" => config.backend.avatar_bucket = value.to_string(),
        "library.page_size" => {
            let size: usize = value.parse().context("page_size")?;
            if size == 0 {
                bail!("page_size must be at least 1");
            }
            config.library.page_size = size;
        }
        "library.default_filter" => {
            config.library.default_filter = parse_bucket(value).map_err(|e| anyhow!(e))?
        }
        "library.default_sort" => {
            config.library.default_sort = parse_sort(value).map_err(|e| anyhow!(e))?
        }
        "logging.level" => config.logging.level = value.to_string(),
        "logging.file" => config.logging.file = parse_bool(value)?,
        _ => bail!("unknown config key '{key}'"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use reelmark_core::library::{Bucket, SortKey};

    use super::*;

    #[test]
    fn test_set_known_keys() {
        let mut config = AppConfig::default();
        set_key(&mut config, "catalog.api_token", "tok-123").unwrap();
        set_key(&mut config, "library.default_filter", "watching").unwrap();
        set_key(&mut config, "library.default_sort", "release-date").unwrap();
        set_key(&mut config, "logging.file", "yes").unwrap();
        assert_eq!(config.catalog.api_token.as_deref(), Some("tok-123"));
        assert_eq!(config.library.default_filter, Bucket::Watching);
        assert_eq!(config.library.default_sort, SortKey::ReleaseDate);
        assert!(config.logging.file);

        set_key(&mut config, "catalog.api_token", "").unwrap();
        assert_eq!(config.catalog.api_token, None);
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut config = AppConfig::default();
        assert!(set_key(&mut config, "library.page_size", "0").is_err());
        assert!(set_key(&mut config, "library.page_size", "many").is_err());
        assert!(set_key(&mut config, "nope.key", "1").is_err());
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_secrets_masked() {
        let mut config = AppConfig::default();
        config.catalog.api_token = Some("eyJhbGciOiJIUzI1NiJ9".into());
        config.backend.anon_key = "anon-key-value".into();
        let shown = masked(config);
        assert_eq!(shown.catalog.api_token.as_deref(), Some("eyJh…"));
        assert_eq!(shown.backend.anon_key, "anon…");
        assert_eq!(mask(""), "");
    }
}
