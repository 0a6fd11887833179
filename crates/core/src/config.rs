//! Configuration management for SmartFind.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config file (`.smartfind/config.yaml` under the data directory)
//! - Environment variables
//! - Command-line flags
//!
//! All engine state (vector index, keyword index, tunables) lives under
//! `<data_dir>/.smartfind/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-data-dir state directory.
pub const STATE_DIR: &str = ".smartfind";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage root for the index and engine settings
    pub data_dir: PathBuf,

    /// Directory holding vocab.json, word_vectors.npy and topic_vectors.npy
    pub asset_dir: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub json_logs: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    data: Option<DataConfig>,
    assets: Option<AssetConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DataConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssetConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let asset_dir = data_dir.join("assets").join("models");
        Self {
            data_dir,
            asset_dir,
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `SMARTFIND_DATA_DIR`: Override data directory
    /// - `SMARTFIND_ASSETS`: Override asset directory
    /// - `SMARTFIND_CONFIG`: Path to config file
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use smartfind_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Data dir: {:?}", config.data_dir);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with a data directory and config file that
    /// take precedence over the environment when choosing which YAML to read.
    pub fn load_from(data_dir: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(data_dir) = std::env::var("SMARTFIND_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(config_file) = std::env::var("SMARTFIND_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if let Some(data_dir) = data_dir {
            config.data_dir = data_dir;
        }

        if let Some(config_file) = config_file {
            config.config_file = Some(config_file);
        }

        if !config.data_dir.exists() {
            return Err(AppError::Config(format!(
                "Data directory does not exist: {:?}",
                config.data_dir
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.state_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(assets) = std::env::var("SMARTFIND_ASSETS") {
            config.asset_dir = PathBuf::from(assets);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.data.and_then(|d| d.path) {
            result.data_dir = PathBuf::from(path);
        }

        if let Some(path) = config_file.assets.and_then(|a| a.path) {
            result.asset_dir = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.json_logs = json;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        data_dir: Option<PathBuf>,
        asset_dir: Option<PathBuf>,
        config_file: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        json_logs: bool,
    ) -> Self {
        if let Some(data_dir) = data_dir {
            self.data_dir = data_dir;
        }

        if let Some(asset_dir) = asset_dir {
            self.asset_dir = asset_dir;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if json_logs {
            self.json_logs = true;
        }

        self
    }

    /// Get the path to the `.smartfind` state directory.
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join(STATE_DIR)
    }

    /// Ensure the `.smartfind` state directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let state_dir = self.state_dir();
        if !state_dir.exists() {
            std::fs::create_dir_all(&state_dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", STATE_DIR, e))
            })?;
        }
        Ok(())
    }

    /// Validate that the configured directories are usable.
    pub fn validate(&self) -> AppResult<()> {
        if !self.asset_dir.is_dir() {
            return Err(AppError::Config(format!(
                "Asset directory not found: {:?}",
                self.asset_dir
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.asset_dir.ends_with("assets/models"));
        assert!(!config.verbose);
        assert!(!config.no_color);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_state_dir() {
        let config = AppConfig::default();
        assert!(config.state_dir().ends_with(".smartfind"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            Some(PathBuf::from("/tmp/data")),
            Some(PathBuf::from("/tmp/assets")),
            None,
            None,
            true,
            false,
            true,
        );

        assert_eq!(overridden.data_dir, PathBuf::from("/tmp/data"));
        assert_eq!(overridden.asset_dir, PathBuf::from("/tmp/assets"));
        assert!(overridden.verbose);
        assert!(overridden.json_logs);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            "assets:\n  path: /opt/models\nlogging:\n  level: warn\n  color: false\n",
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.asset_dir, PathBuf::from("/opt/models"));
        assert_eq!(merged.log_level, Some("warn".to_string()));
        assert!(merged.no_color);
    }

    #[test]
    fn test_load_from_reads_explicit_config_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("custom.yaml");
        fs::write(&file, "assets:\n  path: /opt/custom-models\n").unwrap();

        let config = AppConfig::load_from(Some(temp.path().to_path_buf()), Some(file.clone()))
            .unwrap()
            .with_overrides(
                Some(temp.path().to_path_buf()),
                None,
                Some(file.clone()),
                None,
                false,
                false,
                false,
            );

        if std::env::var("SMARTFIND_ASSETS").is_err() {
            assert_eq!(config.asset_dir, PathBuf::from("/opt/custom-models"));
        }
        assert_eq!(config.config_file, Some(file));
    }

    #[test]
    fn test_load_from_reads_state_dir_config_of_data_dir() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(STATE_DIR)).unwrap();
        fs::write(
            temp.path().join(STATE_DIR).join("config.yaml"),
            "assets:\n  path: /opt/data-dir-models\nlogging:\n  json: true\n",
        )
        .unwrap();

        // SMARTFIND_CONFIG would select a different file
        if std::env::var("SMARTFIND_CONFIG").is_err() {
            let config = AppConfig::load_from(Some(temp.path().to_path_buf()), None).unwrap();
            assert_eq!(config.data_dir, temp.path());
            assert!(config.json_logs);
            if std::env::var("SMARTFIND_ASSETS").is_err() {
                assert_eq!(config.asset_dir, PathBuf::from("/opt/data-dir-models"));
            }
        }
    }

    #[test]
    fn test_load_from_missing_data_dir_fails() {
        let temp = TempDir::new().unwrap();
        let result = AppConfig::load_from(Some(temp.path().join("absent")), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_missing_assets() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            asset_dir: temp.path().join("nope"),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ensure_state_dir() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            data_dir: temp.path().to_path_buf(),
            ..AppConfig::default()
        };
        config.ensure_state_dir().unwrap();
        assert!(temp.path().join(".smartfind").is_dir());
    }
}
