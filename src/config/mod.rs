// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for BandForge.
//!
//! This module provides data structures for loading and managing the
//! backend connection, roster defaults, batch direction pacing and the
//! offline studio.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::band::instruments::normalize;

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BandConfig {
    /// Generation backend connection
    #[serde(default)]
    pub service: ServiceConfig,
    /// Roster defaults
    #[serde(default)]
    pub band: RosterConfig,
    /// Batch direction settings
    #[serde(default)]
    pub direction: DirectionConfig,
    /// Offline studio settings
    #[serde(default)]
    pub offline: OfflineConfig,
}

impl BandConfig {
    /// Load a configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse a configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))
    }

    /// Reject settings no session could run with
    pub fn validate(&self) -> Result<()> {
        if self.service.base_url.trim().is_empty() {
            bail!("service.base_url must not be empty");
        }
        if self.service.timeout_secs == 0 {
            bail!("service.timeout_secs must be greater than zero");
        }
        if !self.band.prompt_template.contains("{instrument}") {
            bail!("band.prompt_template must contain {{instrument}}");
        }
        Ok(())
    }
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Base URL of the backend
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Endpoint paths
    #[serde(default)]
    pub endpoints: Endpoints,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            endpoints: Endpoints::default(),
        }
    }
}

impl ServiceConfig {
    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Endpoint paths relative to the base URL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoints {
    /// Roster selection
    #[serde(default = "default_roster_path")]
    pub roster: String,
    /// Track generation
    #[serde(default = "default_track_path")]
    pub track: String,
    /// Final mix
    #[serde(default = "default_combine_path")]
    pub combine: String,
    /// Conductor direction parsing
    #[serde(default = "default_direction_path")]
    pub direction: String,
}

fn default_roster_path() -> String {
    "/api/generate-band".to_string()
}
fn default_track_path() -> String {
    "/api/generate-ai-music".to_string()
}
fn default_combine_path() -> String {
    "/api/combine-music".to_string()
}
fn default_direction_path() -> String {
    "/api/parse-direction".to_string()
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            roster: default_roster_path(),
            track: default_track_path(),
            combine: default_combine_path(),
            direction: default_direction_path(),
        }
    }
}

/// Roster defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterConfig {
    /// Template for a new member's prompt; `{instrument}` and
    /// `{user_instrument}` are substituted
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
    /// Maximum number of AI members kept from the roster service (0 = no limit)
    #[serde(default = "default_max_members")]
    pub max_members: usize,
    /// Prefix of the key given to the user's own recording
    #[serde(default = "default_user_key_prefix")]
    pub user_key_prefix: String,
}

fn default_prompt_template() -> String {
    "Create complementary {instrument} music that works well with {user_instrument}".to_string()
}
fn default_max_members() -> usize {
    4
}
fn default_user_key_prefix() -> String {
    "user:".to_string()
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            prompt_template: default_prompt_template(),
            max_members: default_max_members(),
            user_key_prefix: default_user_key_prefix(),
        }
    }
}

impl RosterConfig {
    /// Default prompt for a new member
    pub fn default_prompt(&self, instrument: &str, user_instrument: &str) -> String {
        self.prompt_template
            .replace("{instrument}", instrument)
            .replace("{user_instrument}", user_instrument)
    }

    /// Key of the user's own recording
    pub fn user_key(&self, user_instrument: &str) -> String {
        format!("{}{}", self.user_key_prefix, normalize(user_instrument))
    }
}

/// Batch direction settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectionConfig {
    /// Pause between successive member generations, in milliseconds
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

fn default_pacing_ms() -> u64 {
    1000
}

impl Default for DirectionConfig {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing_ms(),
        }
    }
}

impl DirectionConfig {
    /// Pause between successive generations
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// Offline studio settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OfflineConfig {
    /// Simulated latency of every call, in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
    /// Fixed RNG seed for reproducible rosters
    #[serde(default)]
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
service:
  base_url: "http://studio.local:8080"
  timeout_secs: 30
  endpoints:
    combine: "/v2/combine"

band:
  max_members: 3

direction:
  pacing_ms: 250
"#;

        let config = BandConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.service.base_url, "http://studio.local:8080");
        assert_eq!(config.service.timeout(), Duration::from_secs(30));
        assert_eq!(config.service.endpoints.combine, "/v2/combine");
        assert_eq!(config.service.endpoints.track, "/api/generate-ai-music");
        assert_eq!(config.band.max_members, 3);
        assert_eq!(config.direction.pacing(), Duration::from_millis(250));
    }

    #[test]
    fn test_default_values() {
        let config = BandConfig::from_yaml("{}").unwrap();
        assert_eq!(config.service.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.service.timeout_secs, 120);
        assert_eq!(config.band.max_members, 4);
        assert_eq!(config.band.user_key_prefix, "user:");
        assert_eq!(config.direction.pacing_ms, 1000);
        assert_eq!(config.offline.seed, None);
    }

    #[test]
    fn test_default_prompt() {
        let band = RosterConfig::default();
        assert_eq!(
            band.default_prompt("drums", "piano"),
            "Create complementary drums music that works well with piano"
        );
        assert_eq!(band.user_key("piano"), "user:piano");
        assert_eq!(band.user_key(" Electric Guitar"), "user:electric_guitar");
    }

    #[test]
    fn test_validation() {
        assert!(BandConfig::from_yaml("service:\n  timeout_secs: 0\n").is_err());
        assert!(BandConfig::from_yaml("service:\n  base_url: \"\"\n").is_err());
        assert!(BandConfig::from_yaml("band:\n  prompt_template: \"play\"\n").is_err());
        assert!(BandConfig::from_yaml("this is not valid yaml: [").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bandforge.yaml");

        let mut config = BandConfig::default();
        config.offline.seed = Some(7);
        config.direction.pacing_ms = 10;
        config.save(&path).unwrap();

        let loaded = BandConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        assert!(BandConfig::load(dir.path().join("missing.yaml")).is_err());
    }
}
