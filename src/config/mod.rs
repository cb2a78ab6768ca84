// src/config/mod.rs
pub mod app;
pub mod sources;

pub use app::{AppConfig, SourceGrouping};
pub use sources::Source;

use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not configured")]
    NotConfigured(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything one cycle needs, loaded fresh at the start of the cycle.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub app: AppConfig,
    pub sources: Vec<Source>,
}

impl CycleConfig {
    pub fn enabled_sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// Reads the tracker config (TOML + env overrides) and the source list.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub config_path: PathBuf,
    pub sources_path: PathBuf,
    use_process_env: bool,
}

impl ConfigLoader {
    pub fn new(config_path: impl Into<PathBuf>, sources_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            sources_path: sources_path.into(),
            use_process_env: true,
        }
    }

    /// Ignore process environment overrides (tests, reproducible runs).
    pub fn without_env(mut self) -> Self {
        self.use_process_env = false;
        self
    }

    pub fn load(&self) -> Result<CycleConfig> {
        let mut app = AppConfig::load_from(&self.config_path)?;
        if self.use_process_env {
            app.apply_env(|k| std::env::var(k).ok());
        }
        let sources = sources::load_sources_from(&self.sources_path)
            .context("loading source list")?;
        Ok(CycleConfig { app, sources })
    }
}
