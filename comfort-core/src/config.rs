use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path, path::PathBuf, time::Duration};

use crate::provider::ProviderId;

/// Per-request timeout applied to every provider call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 12;

/// Endpoint override for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
}

/// Location used when a check is run without coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultLocation {
    #[serde(default)]
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Provider call timeout in seconds; defaults to [`DEFAULT_TIMEOUT_SECS`].
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub default_location: Option<DefaultLocation>,

    /// Example TOML:
    /// [providers.open-meteo]
    /// base_url = "http://localhost:8080"
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    /// Return the configured default location.
    pub fn default_location(&self) -> Result<&DefaultLocation> {
        self.default_location.as_ref().ok_or_else(|| {
            anyhow!(
                "No default location configured.\n\
                 Hint: pass --lat/--lon or --place, or run `comfort configure` first."
            )
        })
    }

    pub fn set_default_location(&mut self, location: DefaultLocation) {
        self.default_location = Some(location);
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Base URL for a provider: the configured override or its public endpoint.
    pub fn base_url(&self, id: ProviderId) -> &str {
        self.provider_config(id)
            .map(|cfg| cfg.base_url.as_str())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| id.default_base_url())
    }

    /// Set or replace a provider's base URL override.
    pub fn upsert_provider_base_url(&mut self, id: ProviderId, base_url: String) {
        self.providers.insert(id.as_str().to_string(), ProviderConfig { base_url });
    }

    /// Drop a provider override, going back to the public endpoint.
    pub fn remove_provider_override(&mut self, id: ProviderId) -> bool {
        self.providers.remove(id.as_str()).is_some()
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        for name in cfg.providers.keys() {
            ProviderId::try_from(name.as_str())
                .with_context(|| format!("Invalid provider table in {}", path.display()))?;
        }

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "comfort", "comfort-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
