//! Configuration Loader
//!
//! Layers configuration sources in increasing precedence:
//!
//! 1. built-in defaults (every field is `#[serde(default)]`)
//! 2. `config/brixsport.{toml,yaml,json}` when present
//! 3. an explicit file, which must exist when given
//! 4. environment variables `BRIXSPORT__<SECTION>__<FIELD>`
//!
//! The merged result is validated before it is returned.

use super::error::{ConfigResult, ConfigurationError};
use super::ResilienceConfig;
use ::config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Base name of the optional project configuration file
pub const DEFAULT_CONFIG_BASENAME: &str = "config/brixsport";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "BRIXSPORT";

/// Builder-style loader for [`ResilienceConfig`]
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    default_file: Option<String>,
    explicit_file: Option<PathBuf>,
    env_prefix: String,
    env_source: Option<HashMap<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            default_file: Some(DEFAULT_CONFIG_BASENAME.to_string()),
            explicit_file: None,
            env_prefix: ENV_PREFIX.to_string(),
            env_source: None,
        }
    }

    /// Add a file that must exist and overrides the default file
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.explicit_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Skip the optional `config/brixsport.*` lookup
    pub fn without_default_file(mut self) -> Self {
        self.default_file = None;
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read environment overrides from `vars` instead of the process
    /// environment. Keys keep their full `PREFIX__SECTION__FIELD` form.
    pub fn with_env_source(mut self, vars: HashMap<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    /// Load and merge every source without validating
    pub fn load_unvalidated(&self) -> ConfigResult<ResilienceConfig> {
        let mut builder = Config::builder();

        if let Some(basename) = &self.default_file {
            builder = builder.add_source(File::with_name(basename).required(false));
        }

        if let Some(path) = &self.explicit_file {
            if !path.exists() {
                return Err(ConfigurationError::FileNotFound { path: path.clone() });
            }
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .separator("__")
                .try_parsing(true)
                .source(self.env_source.clone()),
        );

        let config: ResilienceConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load, merge and validate
    pub fn load(&self) -> ConfigResult<ResilienceConfig> {
        let config = self.load_unvalidated()?;
        config.validate()?;

        info!(
            environment = %detect_environment(),
            l1_enabled = config.cache.l1_enabled,
            l1_max_size = config.cache.l1_max_size,
            rate_limit_max_requests = config.rate_limit.max_requests,
            breaker_overrides = config.circuit_breakers.components.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }
}

/// Deployment environment name from `BRIXSPORT_ENV`, then `APP_ENV`,
/// defaulting to `development`
pub fn detect_environment() -> String {
    env::var("BRIXSPORT_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}
