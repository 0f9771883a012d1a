//! Plex server connector implementing the [`LocalLibrary`] boundary.
//!
//! Talks to the Plex HTTP API with a server token.  An artist counts as
//! unmatched when its metadata guid is missing or locally scoped
//! (`local://…`), meaning no metadata agent has ever claimed it.

use std::time::Duration;

use serde::Deserialize;

use crate::config::PlexConfig;
use crate::error::{Result, SyncError};
use crate::library::{ArtistUpdate, LocalArtist, LocalLibrary};

/// Plex item type code for music artists.
const TYPE_ARTIST: u32 = 8;

// ── API response types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SectionsResponse {
    #[serde(rename = "MediaContainer")]
    container: SectionsContainer,
}

#[derive(Debug, Deserialize)]
struct SectionsContainer {
    #[serde(rename = "Directory", default)]
    directories: Vec<Directory>,
}

#[derive(Debug, Deserialize)]
struct Directory {
    key: String,
    title: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(rename = "MediaContainer")]
    container: ItemsContainer,
}

#[derive(Debug, Deserialize)]
struct ItemsContainer {
    #[serde(rename = "Metadata", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    title: String,
    #[serde(default)]
    guid: Option<String>,
    #[serde(rename = "originalTitle", default)]
    original_title: Option<String>,
}

// ── Connector ────────────────────────────────────────────────────────────────

pub struct PlexLibrary {
    base_url: String,
    token: String,
    library_name: String,
    agent: ureq::Agent,
    section_key: Option<String>,
}

impl PlexLibrary {
    pub fn new(config: &PlexConfig) -> Self {
        PlexLibrary {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            library_name: config.library_name.clone(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(30))
                .build(),
            section_key: None,
        }
    }

    /// Connect and locate the configured music section.  Fatal when the
    /// server is unreachable or the section does not exist.
    pub fn test_connection(&mut self) -> Result<()> {
        self.section_key()?;
        Ok(())
    }

    fn section_key(&mut self) -> Result<String> {
        if let Some(key) = &self.section_key {
            return Ok(key.clone());
        }

        let url = format!("{}/library/sections", self.base_url);
        let response: SectionsResponse = self.get_json(&url)?;

        let available: Vec<String> = response
            .container
            .directories
            .iter()
            .map(|d| d.title.clone())
            .collect();

        let section = response
            .container
            .directories
            .into_iter()
            .find(|d| d.kind == "artist" && d.title == self.library_name)
            .ok_or_else(|| SyncError::Connectivity {
                service: "Plex".to_string(),
                message: format!(
                    "music library {:?} not found (available: {})",
                    self.library_name,
                    available.join(", ")
                ),
            })?;

        log::info!("Connected to Plex music library {:?}", section.title);
        self.section_key = Some(section.key.clone());
        Ok(section.key)
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let response = self
            .agent
            .get(url)
            .set("X-Plex-Token", &self.token)
            .set("Accept", "application/json")
            .call()
            .map_err(|e| SyncError::Connectivity {
                service: "Plex".to_string(),
                message: e.to_string(),
            })?;

        response.into_json().map_err(|e| SyncError::Connectivity {
            service: "Plex".to_string(),
            message: format!("bad response body: {}", e),
        })
    }

    fn is_unmatched(item: &Item) -> bool {
        match &item.guid {
            None => true,
            Some(guid) => guid.is_empty() || guid.starts_with("local://") || guid.contains("local://"),
        }
    }
}

impl LocalLibrary for PlexLibrary {
    fn list_unmatched(&mut self) -> Result<Vec<LocalArtist>> {
        let key = self.section_key()?;
        let url = format!(
            "{}/library/sections/{}/all?type={}",
            self.base_url, key, TYPE_ARTIST
        );
        let response: ItemsResponse = self.get_json(&url)?;

        let total = response.container.items.len();
        let unmatched: Vec<LocalArtist> = response
            .container
            .items
            .into_iter()
            .filter(Self::is_unmatched)
            .map(|item| LocalArtist {
                rating_key: item.rating_key,
                title: item.title,
                original_title: item.original_title,
                section_title: self.library_name.clone(),
            })
            .collect();

        log::info!("Scanned {} artists, {} unmatched", total, unmatched.len());
        Ok(unmatched)
    }

    fn apply_update(&mut self, rating_key: &str, update: &ArtistUpdate) -> Result<()> {
        let mut url = format!(
            "{}/library/metadata/{}?title.value={}&summary.value={}",
            self.base_url,
            urlencoding::encode(rating_key),
            urlencoding::encode(&update.name),
            urlencoding::encode(&update.biography),
        );
        for (i, genre) in update.genres.iter().enumerate() {
            url.push_str(&format!("&genre%5B{}%5D.tag.tag={}", i, urlencoding::encode(genre)));
        }

        self.agent
            .put(&url)
            .set("X-Plex-Token", &self.token)
            .call()
            .map_err(|e| SyncError::Provider(format!("metadata update failed: {}", e)))?;

        if let Some(image_url) = &update.image_url {
            let poster_url = format!(
                "{}/library/metadata/{}/posters?url={}",
                self.base_url,
                urlencoding::encode(rating_key),
                urlencoding::encode(image_url),
            );
            self.agent
                .post(&poster_url)
                .set("X-Plex-Token", &self.token)
                .call()
                .map_err(|e| SyncError::Provider(format!("poster upload failed: {}", e)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(guid: Option<&str>) -> Item {
        Item {
            rating_key: "1".into(),
            title: "Artist".into(),
            guid: guid.map(String::from),
            original_title: None,
        }
    }

    #[test]
    fn test_missing_or_empty_guid_is_unmatched() {
        assert!(PlexLibrary::is_unmatched(&item(None)));
        assert!(PlexLibrary::is_unmatched(&item(Some(""))));
    }

    #[test]
    fn test_local_guid_is_unmatched() {
        assert!(PlexLibrary::is_unmatched(&item(Some("local://12345"))));
    }

    #[test]
    fn test_agent_guid_is_matched() {
        assert!(!PlexLibrary::is_unmatched(&item(Some(
            "plex://artist/5d07bbfd403c6402904a6471"
        ))));
    }
}
