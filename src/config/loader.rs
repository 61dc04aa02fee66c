//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles file discovery,
//! environment detection and layering of overrides through the `config` crate.

use super::error::{ConfigResult, ConfigurationError};
use super::DispatchConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base configuration file name inside the config directory
const BASE_CONFIG_FILE: &str = "dispatch.toml";

/// Prefix for environment variable overrides, e.g. `DISPATCH__WORKER__PROCESSING_DURATION_MS`
const ENV_PREFIX: &str = "DISPATCH";

/// Loaded, validated configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: DispatchConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading dispatcher configuration"
        );

        let config = Self::load_layers(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            processing_duration_ms = config.worker.processing_duration_ms,
            tick_interval_ms = config.scheduler.tick_interval_ms,
            initial_workers = config.pool.initial_workers,
            max_workers = config.pool.max_workers,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: DispatchConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: Self::default_config_directory(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect the current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("DISPATCH_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        PathBuf::from("config")
    }

    /// Build the layered configuration: defaults, base file, environment file, env vars
    fn load_layers(config_directory: &Path, environment: &str) -> ConfigResult<DispatchConfig> {
        let defaults = Config::try_from(&DispatchConfig::default())
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        let base_file = config_directory.join(BASE_CONFIG_FILE);
        let environment_file = config_directory.join(format!("dispatch.{environment}.toml"));

        debug!(
            base_file = %base_file.display(),
            base_present = base_file.is_file(),
            environment_file = %environment_file.display(),
            environment_present = environment_file.is_file(),
            "Resolved configuration files"
        );

        Config::builder()
            .add_source(defaults)
            .add_source(File::from(base_file).required(false))
            .add_source(File::from(environment_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize::<DispatchConfig>())
            .map_err(|e| ConfigurationError::load_error(environment, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_directory_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().join("absent")), "test")
                .unwrap();

        assert_eq!(manager.environment(), "test");
        assert_eq!(
            manager.config().worker.processing_duration_ms,
            DispatchConfig::default().worker.processing_duration_ms
        );
    }

    #[test]
    fn test_environment_file_overrides_base_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("dispatch.toml"),
            "[worker]\nprocessing_duration_ms = 1500\n\n[scheduler]\ntick_interval_ms = 250\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("dispatch.staging.toml"),
            "[worker]\nprocessing_duration_ms = 40\n",
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "staging")
                .unwrap();

        assert_eq!(manager.config().worker.processing_duration_ms, 40);
        assert_eq!(manager.config().scheduler.tick_interval_ms, 250);
        assert_eq!(manager.config_directory(), dir.path());
    }

    #[test]
    fn test_invalid_file_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("dispatch.toml"),
            "[pool]\ninitial_workers = 10\nmax_workers = 2\n",
        )
        .unwrap();

        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_from_config_validates() {
        let mut config = DispatchConfig::default();
        config.channels.handoff_buffer_size = 0;
        assert!(ConfigManager::from_config(config).is_err());
    }
}
