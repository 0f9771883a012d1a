//! Configuration loading and validation.
//!
//! Read from `artistsync.toml` next to the binary first, then from
//! `~/.config/artistsync/config.toml`.  Validation runs before any matching
//! work: missing sections and placeholder credentials are fatal.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Values that ship in the sample config and must be replaced by the user.
const PLACEHOLDERS: &[&str] = &[
    "your-plex-token",
    "your-plex-url",
    "your-spotify-client-id",
    "your-spotify-client-secret",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub plex: PlexConfig,
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexConfig {
    pub base_url: String,
    pub token: String,
    pub library_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub auto_match_threshold: f64,
    pub review_threshold: f64,
    /// Per-artist processing time limit in seconds; overruns are logged.
    pub timeout_threshold_secs: u64,
    pub max_alternatives: usize,
    /// Courtesy delay between artist-level lookups, in milliseconds.
    pub request_delay_ms: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        MatchingConfig {
            auto_match_threshold: 0.95,
            review_threshold: 0.80,
            timeout_threshold_secs: 25,
            max_alternatives: 5,
            request_delay_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub timeout_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { timeout_secs: 3600, max_entries: 1000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Directory for review-decision and match-result artifacts.
    pub dir: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        SessionsConfig { dir: "results".to_string() }
    }
}

impl CacheConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Candidate config paths, in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("artistsync.toml")];
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(PathBuf::from(home).join(".config/artistsync/config.toml"));
        }
        paths
    }

    /// Load the first config file found on the search path.
    pub fn load() -> Result<Config> {
        for path in Self::search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Err(SyncError::Config(
            "no configuration file found; create artistsync.toml with [plex] and [spotify] sections"
                .to_string(),
        ))
    }

    pub fn load_from(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            SyncError::Config(format!("invalid TOML in {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject empty and placeholder credentials before any network work.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("plex.base_url", self.plex.base_url.as_str()),
            ("plex.token", self.plex.token.as_str()),
            ("plex.library_name", self.plex.library_name.as_str()),
            ("spotify.client_id", self.spotify.client_id.as_str()),
            ("spotify.client_secret", self.spotify.client_secret.as_str()),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(SyncError::Config(format!("{} is empty", name)));
            }
            if PLACEHOLDERS.contains(&value) {
                return Err(SyncError::Config(format!(
                    "{} still contains the placeholder value {:?}; update it with your actual credentials",
                    name, value
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.matching.review_threshold)
            || !(0.0..=1.0).contains(&self.matching.auto_match_threshold)
        {
            return Err(SyncError::Config(
                "matching thresholds must be within [0, 1]".to_string(),
            ));
        }
        if self.matching.review_threshold > self.matching.auto_match_threshold {
            return Err(SyncError::Config(
                "matching.review_threshold must not exceed matching.auto_match_threshold".to_string(),
            ));
        }

        Ok(())
    }
}
