use crate::core::image::DEFAULT_FORMATS;
use crate::core::search::RankingPolicy;
use crate::database::{get_database_path, DatabaseError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: Option<PathBuf>,
    pub supported_formats: Vec<String>,
    pub batch_size: usize,
    pub progress_percent: usize,
    pub near_duplicate_distance: f32,
    pub result_limit: usize,
    pub skip_hidden: bool,
    pub parallel_workers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            supported_formats: DEFAULT_FORMATS.iter().map(|s| s.to_string()).collect(),
            batch_size: 50,
            progress_percent: 1,
            near_duplicate_distance: 2.0,
            result_limit: 10,
            skip_hidden: true,
            parallel_workers: num_cpus::get(),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Explicit file if given, else `<config dir>/snapfind/config.json` when it
    /// exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::default_config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("snapfind").join("config.json"))
    }

    pub fn database_path(&self) -> Result<PathBuf, DatabaseError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => get_database_path(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub fn ranking_policy(&self) -> RankingPolicy {
        RankingPolicy {
            near_duplicate_distance: self.near_duplicate_distance,
            result_limit: self.result_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.progress_percent, 1);
        assert_eq!(config.result_limit, 10);
        assert_eq!(config.near_duplicate_distance, 2.0);
        assert_eq!(
            config.supported_formats,
            vec!["jpg", "jpeg", "png", "heic", "tiff", "bmp"]
        );
        assert!(config.parallel_workers >= 1);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{ "batch_size": 8, "database_path": "/tmp/x.db" }"#).unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/x.db"));
        assert_eq!(config.result_limit, 10);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let config = AppConfig {
            batch_size: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.batch_size(), 1);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }
}
