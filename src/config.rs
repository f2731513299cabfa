//! Runtime configuration
//!
//! Loaded from `~/.dealtrack/config.json` when present. Every field has a
//! default, so a partial file only overrides what it names.

use crate::services::images::DEFAULT_IMAGE_TTL;
use crate::services::normalizer::DEFAULT_DOUBLE_SCALE_THRESHOLD;
use crate::types::{DealError, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for one source's whole fetch unless configured otherwise
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 15;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) dealtrack";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Storefront country code (ISO 3166-1 alpha-2)
    pub country: String,
    /// Storefront locale used in URLs and API queries
    pub locale: String,
    /// Steam's `l=` language name
    pub steam_language: String,
    /// Currency requested from stores that take one (GOG)
    pub currency: String,
    pub user_agent: String,
    /// Per HTTP request timeout
    pub request_timeout_secs: u64,
    /// Upper bound for one source's whole fetch
    pub source_timeout_secs: u64,
    /// Lifetime of cached normalized candidates per platform
    pub cache_ttl_secs: u64,
    /// Lifetime of resolved image references
    pub image_cache_ttl_secs: u64,
    /// A converted price above this is assumed to still be in minor units
    pub double_scale_threshold: f64,
    pub gog_page_size: u32,
    /// Elements requested from the Epic catalog search in one query
    pub epic_catalog_count: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            country: "FR".into(),
            locale: "fr".into(),
            steam_language: "french".into(),
            currency: "EUR".into(),
            user_agent: DEFAULT_USER_AGENT.into(),
            request_timeout_secs: 10,
            source_timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
            cache_ttl_secs: 20 * 60,
            image_cache_ttl_secs: DEFAULT_IMAGE_TTL.as_secs(),
            double_scale_threshold: DEFAULT_DOUBLE_SCALE_THRESHOLD,
            gog_page_size: 100,
            epic_catalog_count: 1000,
        }
    }
}

impl AppConfig {
    /// Load from an explicit path, or the default location.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DealError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        let config: AppConfig = serde_json::from_str(&content).map_err(|e| {
            DealError::Config(format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.dealtrack/config.json`
    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|d| d.home_dir().join(".dealtrack").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 || self.source_timeout_secs == 0 {
            return Err(DealError::Config("timeouts must be greater than zero".into()));
        }
        if !(self.double_scale_threshold > 0.0) {
            return Err(DealError::Config(
                "double_scale_threshold must be positive".into(),
            ));
        }
        if self.gog_page_size == 0 || self.epic_catalog_count == 0 {
            return Err(DealError::Config("page sizes must be greater than zero".into()));
        }
        if self.country.trim().is_empty() || self.locale.trim().is_empty() {
            return Err(DealError::Config("country and locale are required".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn image_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.image_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_ttl(), Duration::from_secs(1200));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"country": "US", "locale": "en-US"}"#).unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.country, "US");
        assert_eq!(config.locale, "en-US");
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.gog_page_size, 100);
        assert_eq!(config.epic_catalog_count, 1000);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp = TempDir::new().unwrap();
        let err = AppConfig::load(Some(&temp.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, DealError::Config(_)));
    }

    #[test]
    fn test_unreadable_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let err = AppConfig::load(Some(temp.path())).unwrap_err();
        assert!(matches!(err, DealError::Io(_)));
    }

    #[test]
    fn test_corrupted_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }

    #[test]
    fn test_zero_catalog_count_rejected() {
        let config = AppConfig {
            epic_catalog_count: 0,
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(DealError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"source_timeout_secs": 0}"#).unwrap();
        assert!(AppConfig::load(Some(&path)).is_err());
    }
}
