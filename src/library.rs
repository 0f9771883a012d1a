//! Local-library boundary.
//!
//! The core only needs two capabilities from the local media library: list
//! the artists that lack authoritative metadata, and apply an accepted
//! update back.  The concrete Plex connector lives in [`crate::plex`].

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Snapshot of a local-library artist taken at scan time.  Produced fresh
/// each run; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalArtist {
    /// Opaque stable identifier within the library.
    pub rating_key: String,
    pub title: String,
    #[serde(default)]
    pub original_title: Option<String>,
    pub section_title: String,
}

/// Field set written back to the library for an accepted match.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistUpdate {
    pub name: String,
    pub genres: Vec<String>,
    pub biography: String,
    pub image_url: Option<String>,
}

/// Capability interface for the local media library.
pub trait LocalLibrary {
    /// Artists whose metadata-association identifier is empty, locally
    /// scoped only, or explicitly flagged unmatched.
    fn list_unmatched(&mut self) -> Result<Vec<LocalArtist>>;

    /// Apply an update to one artist, identified by its rating key.
    fn apply_update(&mut self, rating_key: &str, update: &ArtistUpdate) -> Result<()>;
}
