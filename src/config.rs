//! Configuration management using the prefer crate for discovery.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::browser::{BrowserLaunchConfig, ChromiumLauncher};
use crate::navigation::NavigationConfig;
use crate::orchestrator::Scraper;
use crate::profile::ProfileRegistry;
use crate::resolver::{PassthroughResolver, ResolveUrl, UrlResolver};

/// Redirect resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_resolver_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_resolver_timeout() -> u64 {
    8
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_resolver_timeout(),
        }
    }
}

fn default_request_deadline() -> u64 {
    60
}

fn default_bind() -> String {
    "127.0.0.1:3030".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserLaunchConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Hard limit on one scrape, URL resolution to extraction.
    #[serde(default = "default_request_deadline")]
    pub request_deadline_secs: u64,
    /// Default address for `serve`.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// File this config was read from, if any.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser: BrowserLaunchConfig::default(),
            navigation: NavigationConfig::default(),
            resolver: ResolverConfig::default(),
            request_deadline_secs: default_request_deadline(),
            bind: default_bind(),
            source_path: None,
        }
    }
}

impl Config {
    /// Load configuration, auto-discovering `marketscrape.{toml,yaml,json}`
    /// in the standard locations.
    pub async fn load() -> Self {
        match prefer::load("marketscrape").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("{}; using defaults", e);
                        Self::default_with_env()
                    }
                },
                None => Self::default_with_env(),
            },
            Err(_) => Self::default_with_env(),
        }
    }

    /// Load from `path` when given, otherwise discover.
    pub async fn load_with(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::load_from_path(path).await.unwrap_or_else(|e| {
                warn!("{}; using defaults", e);
                Self::default_with_env()
            }),
            None => Self::load().await,
        }
    }

    /// Defaults with environment overrides applied.
    pub fn default_with_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// Format follows the extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        debug!("Loaded config from {}", path.display());
        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        self.browser = self.browser.with_env_overrides();
        self
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }

    /// Build a scraper backed by Chrome with the built-in profiles.
    pub fn build_scraper(&self, resolve_urls: bool) -> anyhow::Result<Scraper> {
        let resolver: Arc<dyn ResolveUrl> = if resolve_urls && self.resolver.enabled {
            Arc::new(
                UrlResolver::new(Duration::from_secs(self.resolver.timeout_secs))
                    .context("Failed to build URL resolver")?,
            )
        } else {
            Arc::new(PassthroughResolver)
        };

        Ok(Scraper::new(
            Arc::new(ProfileRegistry::builtin()),
            resolver,
            Arc::new(ChromiumLauncher::new(self.browser.clone())),
            self.navigation.controller(),
        )
        .with_launch_timeout(self.browser.launch_timeout())
        .with_request_deadline(self.request_deadline()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::LaunchPreset;
    use std::io::Write;

    fn write_config(ext: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{}", ext))
            .tempfile()
            .unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn loads_toml_sections() {
        let file = write_config(
            "toml",
            r#"
            request_deadline_secs = 45
            bind = "0.0.0.0:8080"

            [browser]
            preset = "constrained"
            headless = false

            [navigation]
            timeout_secs = 40
            "#,
        );
        let config = Config::load_from_path(file.path()).await.unwrap();
        assert_eq!(config.request_deadline(), Duration::from_secs(45));
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert!(!config.browser.headless);
        assert_eq!(config.navigation.timeout_secs, 40);
        assert_eq!(config.navigation.max_expand_clicks, 6);
        assert!(config.resolver.enabled);
        assert_eq!(config.source_path.as_deref(), Some(file.path()));
        // Env may override the preset, so only check it parsed to something.
        assert!(matches!(
            config.browser.preset,
            LaunchPreset::Constrained | LaunchPreset::Local
        ));
    }

    #[tokio::test]
    async fn loads_yaml_and_json() {
        let yaml = write_config("yaml", "resolver:\n  enabled: false\n  timeout_secs: 3\n");
        let config = Config::load_from_path(yaml.path()).await.unwrap();
        assert!(!config.resolver.enabled);
        assert_eq!(config.resolver.timeout_secs, 3);

        let json = write_config("json", r#"{"navigation": {"settle_ms": 250}}"#);
        let config = Config::load_from_path(json.path()).await.unwrap();
        assert_eq!(config.navigation.settle_ms, 250);
        assert_eq!(config.request_deadline_secs, 60);
    }

    #[tokio::test]
    async fn invalid_file_falls_back_to_defaults() {
        let file = write_config("toml", "this is = = not toml");
        assert!(Config::load_from_path(file.path()).await.is_err());

        let config = Config::load_with(Some(file.path())).await;
        assert_eq!(config.request_deadline_secs, 60);
        assert_eq!(config.bind, "127.0.0.1:3030");
    }

    #[test]
    fn builds_scraper_without_resolution() {
        let config = Config::default();
        let scraper = config.build_scraper(false).unwrap();
        assert_eq!(scraper.registry().profiles().len(), 2);
    }
}
