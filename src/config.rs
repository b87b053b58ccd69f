//! Layered settings
//!
//! Built-in defaults, then an optional config file, then environment
//! variables prefixed `PHISHGUARD_` with `__` between section and key:
//!
//! ```text
//! PHISHGUARD_SERVER__PORT=9000
//! PHISHGUARD_RESOLVER__TIMEOUT_SECS=3
//! PHISHGUARD_MODEL__THRESHOLD=0.7
//! ```

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::link_resolver::{ResolverConfig, ShortenerDomainSet};

/// Default capacity for the job queue
pub const QUEUE_SIZE: usize = 64;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub resolver: ResolverSettings,
    pub storage: StorageSettings,
    pub model: ModelSettings,
    pub features: FeatureSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub queue_size: usize,
    pub workers: usize,
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            queue_size: QUEUE_SIZE,
            workers: 4,
            request_timeout_secs: 30,
        }
    }
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_redirects: usize,
    pub max_concurrency: usize,
    /// Replaces the built-in shortener list when set
    pub shortener_domains: Option<Vec<String>>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        let defaults = ResolverConfig::default();
        Self {
            timeout_secs: defaults.request_timeout.as_secs(),
            user_agent: defaults.user_agent,
            max_redirects: defaults.max_redirects,
            max_concurrency: defaults.max_concurrency,
            shortener_domains: None,
        }
    }
}

impl ResolverSettings {
    pub fn to_resolver_config(&self) -> ResolverConfig {
        let timeout = Duration::from_secs(self.timeout_secs);
        let mut config = ResolverConfig::new()
            .with_request_timeout(timeout)
            .with_connection_timeout(timeout)
            .with_user_agent(self.user_agent.clone())
            .with_max_redirects(self.max_redirects)
            .with_max_concurrency(self.max_concurrency);

        if let Some(domains) = &self.shortener_domains {
            config = config.with_shortener_domains(ShortenerDomainSet::new(domains));
        }
        config
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub cache_db_path: PathBuf,
    pub feedback_db_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            cache_db_path: PathBuf::from("data/url_cache.db"),
            feedback_db_path: PathBuf::from("data/feedback.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub path: PathBuf,
    pub threshold: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/model.json"),
            threshold: crate::model::DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    /// Full public suffix list; the embedded list is used when unset
    pub public_suffix_list: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub raw_data_path: PathBuf,
    pub artifact_dir: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            raw_data_path: PathBuf::from("phishingdata/raw_data.csv"),
            artifact_dir: PathBuf::from("Artifacts"),
        }
    }
}

impl Settings {
    /// Loads settings from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Environment::with_prefix("PHISHGUARD"))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!("Reading settings from {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(env.prefix_separator("_").separator("__").try_parsing(true))
            .build()
            .context("Failed to build settings")?
            .try_deserialize()
            .context("Failed to deserialize settings")?;

        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("PHISHGUARD").source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load_with_env(None, env(&[])).unwrap();
        assert_eq!(settings.resolver.timeout_secs, 6);
        assert_eq!(settings.resolver.max_redirects, 10);
        assert_eq!(settings.model.threshold, 0.5);
        assert_eq!(settings.server.port, 8000);
        assert!(settings.features.public_suffix_list.is_none());
    }

    #[test]
    fn test_environment_overrides() {
        let settings = Settings::load_with_env(
            None,
            env(&[
                ("PHISHGUARD_RESOLVER__TIMEOUT_SECS", "3"),
                ("PHISHGUARD_SERVER__PORT", "9000"),
                ("PHISHGUARD_MODEL__THRESHOLD", "0.7"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.resolver.timeout_secs, 3);
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.model.threshold, 0.7);
        assert_eq!(
            settings.resolver.to_resolver_config().request_timeout,
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_file_then_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phishguard.toml");
        std::fs::write(
            &path,
            "[server]\nport = 7000\nworkers = 2\n\n[resolver]\nshortener_domains = [\"go.example.com\"]\n",
        )
        .unwrap();

        let settings =
            Settings::load_with_env(Some(&path), env(&[("PHISHGUARD_SERVER__PORT", "7100")])).unwrap();
        assert_eq!(settings.server.port, 7100);
        assert_eq!(settings.server.workers, 2);
        assert_eq!(settings.resolver.to_resolver_config().shorteners.len(), 1);
    }
}
