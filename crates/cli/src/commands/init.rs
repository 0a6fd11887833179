//! Init command implementation.

use anyhow::Context;
use clap::Args;
use smartfind_core::AppConfig;
use smartfind_engine::{EngineConfig, EnginePaths, RetrievalStrategy};
use std::path::Path;

/// Write the default engine settings for the data directory
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Overwrite an existing engine.yaml
    #[arg(long)]
    pub force: bool,

    /// Maintain the keyword index alongside the vector index
    #[arg(long)]
    pub lexical: bool,

    /// Default ranking strategy
    #[arg(short, long)]
    pub strategy: Option<RetrievalStrategy>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl InitCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing init command");

        let path = EnginePaths::from_app_config(config).config_path();
        let written = self.write_settings(&path)?;

        if self.json {
            return super::print_json(&serde_json::json!({
                "path": path,
                "written": written,
            }));
        }

        if written {
            println!("✓ Wrote engine settings to {}", path.display());
        } else {
            println!(
                "Engine settings already exist at {} (use --force to overwrite)",
                path.display()
            );
        }
        Ok(())
    }

    fn settings(&self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            lexical_enabled: self.lexical,
            strategy: self.strategy.unwrap_or(defaults.strategy),
            ..defaults
        }
    }

    /// Returns false when an existing file was left untouched.
    fn write_settings(&self, path: &Path) -> anyhow::Result<bool> {
        if path.exists() && !self.force {
            tracing::debug!("Keeping existing engine settings at {:?}", path);
            return Ok(false);
        }

        let settings = self.settings();
        settings.validate()?;
        settings
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn command(force: bool, lexical: bool) -> InitCommand {
        InitCommand {
            force,
            lexical,
            strategy: None,
            json: false,
        }
    }

    #[test]
    fn test_init_writes_loadable_settings() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".smartfind").join("engine.yaml");

        let cmd = InitCommand {
            strategy: Some(RetrievalStrategy::Hybrid),
            ..command(false, true)
        };
        assert!(cmd.write_settings(&path).unwrap());

        let loaded = EngineConfig::load(&path).unwrap();
        assert!(loaded.lexical_enabled);
        assert_eq!(loaded.strategy, RetrievalStrategy::Hybrid);
        assert_eq!(loaded.top_k, EngineConfig::default().top_k);
    }

    #[test]
    fn test_init_keeps_existing_settings_without_force() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("engine.yaml");
        std::fs::write(&path, "top_k: 3\n").unwrap();

        assert!(!command(false, false).write_settings(&path).unwrap());
        assert_eq!(EngineConfig::load(&path).unwrap().top_k, 3);

        assert!(command(true, false).write_settings(&path).unwrap());
        assert_eq!(
            EngineConfig::load(&path).unwrap().top_k,
            EngineConfig::default().top_k
        );
    }
}
