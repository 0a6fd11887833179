//! Engine tunables and on-disk layout.

use crate::types::RetrievalStrategy;
use serde::{Deserialize, Serialize};
use smartfind_core::config::STATE_DIR;
use smartfind_core::{AppConfig, AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Retrieval thresholds and strategy.
///
/// Persisted as `.smartfind/engine.yaml` under the data directory. Missing
/// keys fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum score (exclusive) for a query hit
    #[serde(default = "default_search_threshold")]
    pub search_threshold: f32,

    /// Minimum score (exclusive) for a "similar files" hit
    #[serde(default = "default_similar_threshold")]
    pub similar_threshold: f32,

    /// Minimum score (exclusive) to join a duplicate cluster
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f32,

    /// Default number of results
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Texts shorter than this are not classified
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,

    #[serde(default)]
    pub strategy: RetrievalStrategy,

    /// Maintain the keyword index alongside the vector index
    #[serde(default)]
    pub lexical_enabled: bool,

    /// Rank offset for reciprocal-rank fusion
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
}

fn default_search_threshold() -> f32 {
    0.30
}

fn default_similar_threshold() -> f32 {
    0.01
}

fn default_duplicate_threshold() -> f32 {
    0.98
}

fn default_top_k() -> usize {
    10
}

fn default_min_text_chars() -> usize {
    crate::topics::MIN_TEXT_CHARS
}

fn default_rrf_k() -> f32 {
    60.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_threshold: default_search_threshold(),
            similar_threshold: default_similar_threshold(),
            duplicate_threshold: default_duplicate_threshold(),
            top_k: default_top_k(),
            min_text_chars: default_min_text_chars(),
            strategy: RetrievalStrategy::default(),
            lexical_enabled: false,
            rrf_k: default_rrf_k(),
        }
    }
}

impl EngineConfig {
    /// Load from `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::debug!("No engine config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read engine config at {:?}: {}", path, e))
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse engine config at {:?}: {}", path, e))
        })?;
        config.validate()?;

        tracing::debug!("Loaded engine config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        tracing::debug!("Saved engine config to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("search_threshold", self.search_threshold),
            ("similar_threshold", self.similar_threshold),
            ("duplicate_threshold", self.duplicate_threshold),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "{} must be within [-1, 1], got {}",
                    name, value
                )));
            }
        }

        if self.top_k == 0 {
            return Err(AppError::Config("top_k must be at least 1".to_string()));
        }

        if !(self.rrf_k > 0.0) {
            return Err(AppError::Config(format!(
                "rrf_k must be positive, got {}",
                self.rrf_k
            )));
        }

        Ok(())
    }
}

/// Filesystem locations the engine reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct EnginePaths {
    pub data_dir: PathBuf,
    pub asset_dir: PathBuf,
}

impl EnginePaths {
    pub fn new(data_dir: impl Into<PathBuf>, asset_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            asset_dir: asset_dir.into(),
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.data_dir.clone(), config.asset_dir.clone())
    }

    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join(STATE_DIR)
    }

    /// SQLite file holding the vector index.
    pub fn index_path(&self) -> PathBuf {
        self.state_dir().join("index.sqlite")
    }

    /// SQLite file holding the keyword index.
    pub fn lexical_path(&self) -> PathBuf {
        self.state_dir().join("lexical.sqlite")
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir().join("engine.yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.search_threshold, 0.30);
        assert_eq!(config.similar_threshold, 0.01);
        assert_eq!(config.duplicate_threshold, 0.98);
        assert_eq!(config.top_k, 10);
        assert_eq!(config.min_text_chars, 5);
        assert_eq!(config.strategy, RetrievalStrategy::Vector);
        assert!(!config.lexical_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_is_default() {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig::load(&temp.path().join("engine.yaml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let paths = EnginePaths::new(temp.path(), temp.path().join("assets"));

        let config = EngineConfig {
            search_threshold: 0.5,
            strategy: RetrievalStrategy::Hybrid,
            lexical_enabled: true,
            ..Default::default()
        };
        config.save(&paths.config_path()).unwrap();

        let loaded = EngineConfig::load(&paths.config_path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("engine.yaml");
        fs::write(&path, "similar_threshold: 0.2\nstrategy: lexical\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.similar_threshold, 0.2);
        assert_eq!(config.strategy, RetrievalStrategy::Lexical);
        assert_eq!(config.top_k, 10);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_threshold = EngineConfig {
            duplicate_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(bad_threshold.validate(), Err(AppError::Config(_))));

        let bad_top_k = EngineConfig {
            top_k: 0,
            ..Default::default()
        };
        assert!(bad_top_k.validate().is_err());

        let bad_rrf = EngineConfig {
            rrf_k: 0.0,
            ..Default::default()
        };
        assert!(bad_rrf.validate().is_err());
    }

    #[test]
    fn test_paths_layout() {
        let paths = EnginePaths::new("/data", "/assets");
        assert_eq!(paths.index_path(), PathBuf::from("/data/.smartfind/index.sqlite"));
        assert_eq!(paths.lexical_path(), PathBuf::from("/data/.smartfind/lexical.sqlite"));
        assert_eq!(paths.config_path(), PathBuf::from("/data/.smartfind/engine.yaml"));
    }
}
