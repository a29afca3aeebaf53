//! Bot configuration loaded from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::utils::AppPaths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Delay after the first item of an album before it is merged.
    pub quiet_window_ms: u64,
    pub default_limit: usize,
    pub min_limit: usize,
    pub max_limit: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            quiet_window_ms: 1500,
            default_limit: 6,
            min_limit: 1,
            max_limit: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub page_size: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { page_size: 6 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BouquetsConfig {
    pub page_size: usize,
    /// Generated ids start right after this number.
    pub first_number: u32,
}

impl Default for BouquetsConfig {
    fn default() -> Self {
        Self {
            page_size: 5,
            first_number: 200,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub media: MediaConfig,
    pub catalog: CatalogConfig,
    pub bouquets: BouquetsConfig,
    pub database: DatabaseConfig,
}

impl BotConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)
            .map_err(|e| Error::Configuration(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Loads the explicit file if given, otherwise the first discovered one.
    ///
    /// An explicit file must exist and parse. A discovered file that fails to
    /// parse is skipped with a warning.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }

        for candidate in AppPaths::discover_configs() {
            if !candidate.exists() {
                continue;
            }
            match Self::from_path(&candidate) {
                Ok(config) => {
                    debug!(
                        target: "bouquet::config",
                        path = %candidate.display(),
                        "Loaded configuration"
                    );
                    return Ok(config);
                }
                Err(e) => {
                    warn!(
                        target: "bouquet::config",
                        path = %candidate.display(),
                        error = %e,
                        "Ignoring unreadable configuration file"
                    );
                }
            }
        }

        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        let media = &self.media;
        if media.min_limit == 0 || media.min_limit > media.max_limit {
            return Err(Error::Configuration(format!(
                "media limits must satisfy 1 <= min_limit <= max_limit (got {}..{})",
                media.min_limit, media.max_limit
            )));
        }
        if !(media.min_limit..=media.max_limit).contains(&media.default_limit) {
            return Err(Error::Configuration(format!(
                "media.default_limit {} is outside {}..={}",
                media.default_limit, media.min_limit, media.max_limit
            )));
        }
        if self.catalog.page_size == 0 || self.bouquets.page_size == 0 {
            return Err(Error::Configuration("page sizes must be positive".into()));
        }
        Ok(())
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.media.quiet_window_ms)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(AppPaths::default_database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_file_yields_defaults() {
        let config = BotConfig::from_toml_str("").unwrap();
        assert_eq!(config, BotConfig::default());
        assert_eq!(config.quiet_window(), Duration::from_millis(1500));
        assert_eq!(config.bouquets.first_number, 200);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = BotConfig::from_toml_str(
            r#"
            [media]
            quiet_window_ms = 20
            max_limit = 12

            [database]
            path = "/tmp/b.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.media.quiet_window_ms, 20);
        assert_eq!(config.media.max_limit, 12);
        assert_eq!(config.media.default_limit, 6);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/b.db"));
    }

    #[test]
    fn rejects_inconsistent_limits() {
        let err = BotConfig::from_toml_str("[media]\nmin_limit = 5\nmax_limit = 3\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(BotConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[catalog]\npage_size = 3\n").unwrap();
        assert_eq!(BotConfig::load(Some(&path)).unwrap().catalog.page_size, 3);
    }
}
