// src/config/loader.rs
//! Layered configuration loading
//!
//! Sources are merged in order: built-in defaults, each TOML file that
//! exists, then `AFFECT_`-prefixed environment variables. Nested keys use a
//! double underscore, e.g. `AFFECT_INFERENCE__TICK_INTERVAL_MS=1000`.

use crate::config::{constants::paths, PipelineConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation errors: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("IO error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parse error: {0}")]
    Parse(String),

    #[error("Configuration source error: {0}")]
    Source(#[from] ::config::ConfigError),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Loads a [`PipelineConfig`] from defaults, files and the environment
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader reading `affect.toml` from the working directory plus the environment
    pub fn new() -> Self {
        Self {
            config_paths: vec![PathBuf::from(paths::LOCAL_CONFIG_FILE)],
            env_prefix: Some(paths::ENV_PREFIX.to_string()),
        }
    }

    /// Create loader with custom paths
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            ..Self::new()
        }
    }

    /// Skip environment overrides
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Merge every source, deserialize and validate
    pub fn load(&self) -> Result<PipelineConfig, ConfigError> {
        let mut builder = ::config::Config::builder()
            .add_source(::config::Config::try_from(&PipelineConfig::default())?);

        for path in &self.config_paths {
            builder = builder.add_source(
                ::config::File::from(path.as_path())
                    .format(::config::FileFormat::Toml)
                    .required(false),
            );
        }

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                ::config::Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator(paths::ENV_SEPARATOR)
                    .try_parsing(true),
            );
        }

        let config: PipelineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            sources = self.config_paths.len(),
            sampling_rate_hz = config.signal.sampling_rate_hz,
            buffer_capacity = config.signal.buffer_capacity,
            "configuration loaded"
        );

        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<PipelineConfig, ConfigError> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a single TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Write a configuration as pretty TOML
    pub fn export_toml<P: AsRef<Path>>(config: &PipelineConfig, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(config).map_err(|e| ConfigError::Parse(e.to_string()))?;

        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}
