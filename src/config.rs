// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Application configuration management.
//!
//! Configuration is stored as TOML via `confy`. It selects where the module
//! artifact comes from (HTTP base URL or local directory), the reachability
//! probe target and the window size. Command-line flags override it per run.

use module_host::{FetchError, FileFetcher, HttpFetcher, ProbeConfig, SourceFetcher};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::loader::DEFAULT_RESOURCE;

const APP_NAME: &str = "beacon-desktop";
const CONFIG_NAME: &str = "config";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Name of the module artifact, resolved against the source
    #[serde(default = "default_resource")]
    pub resource: String,

    /// Fetch the module over HTTP relative to this URL (takes precedence over module_dir)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Directory to read the module from when no base URL is set (default: working directory)
    #[serde(default)]
    pub module_dir: Option<PathBuf>,

    /// Reachability probe target in host:port format
    #[serde(default = "default_probe_address")]
    pub probe_address: String,

    /// Seconds between reachability probes
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// Connect timeout for one probe in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Initial window width in pixels
    #[serde(default = "default_window_width")]
    pub window_width: f32,

    /// Initial window height in pixels
    #[serde(default = "default_window_height")]
    pub window_height: f32,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_resource() -> String {
    DEFAULT_RESOURCE.to_string()
}

fn default_probe_address() -> String {
    ProbeConfig::default().address
}

fn default_probe_interval_secs() -> u64 {
    5
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_window_width() -> f32 {
    720.0
}

fn default_window_height() -> f32 {
    540.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            resource: default_resource(),
            base_url: None,
            module_dir: None,
            probe_address: default_probe_address(),
            probe_interval_secs: default_probe_interval_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating it with defaults on first run
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    /// Probe settings; a zero interval is raised to one second
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            address: self.probe_address.clone(),
            interval: Duration::from_secs(self.probe_interval_secs.max(1)),
            timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }

    /// Build the fetcher for the configured module source
    pub fn fetcher(&self) -> Result<SourceFetcher, FetchError> {
        if let Some(base_url) = &self.base_url {
            return Ok(SourceFetcher::Http(HttpFetcher::new(base_url)?));
        }

        let root = self.module_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        Ok(SourceFetcher::File(FileFetcher::new(root)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.resource, "module.wasm");
        assert_eq!(config.probe_address, "1.1.1.1:53");
        assert!(config.base_url.is_none());

        let probe = config.probe_config();
        assert_eq!(probe.interval, Duration::from_secs(5));
        assert_eq!(probe.timeout, Duration::from_millis(2000));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: AppConfig = parse_config("resource = \"other.wasm\"\n");
        assert_eq!(config.resource, "other.wasm");
        assert_eq!(config.probe_interval_secs, 5);
        assert_eq!(config.config_version, 1);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = AppConfig {
            probe_interval_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.probe_config().interval, Duration::from_secs(1));
    }

    #[test]
    fn test_fetcher_selection() {
        let config = AppConfig {
            module_dir: Some(PathBuf::from("/srv/modules")),
            ..AppConfig::default()
        };
        assert!(matches!(config.fetcher(), Ok(SourceFetcher::File(f)) if f.root() == PathBuf::from("/srv/modules")));

        let config = AppConfig {
            base_url: Some("http://localhost:8000/pkg/".to_string()),
            module_dir: Some(PathBuf::from("/srv/modules")),
            ..AppConfig::default()
        };
        assert!(matches!(config.fetcher(), Ok(SourceFetcher::Http(_))));

        let config = AppConfig {
            base_url: Some("::not a url::".to_string()),
            ..AppConfig::default()
        };
        assert!(matches!(config.fetcher(), Err(FetchError::InvalidUrl(_))));
    }

    /// Round-trip through the same TOML format confy writes
    fn parse_config(text: &str) -> AppConfig {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, text).unwrap();
        confy::load_path(&path).unwrap()
    }
}
