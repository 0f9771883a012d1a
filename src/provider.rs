//! Metadata-provider boundary.
//!
//! The [`MetadataProvider`] trait defines the capability interface the
//! matching core needs from an external music-metadata service.  The
//! concrete Spotify client lives in [`crate::spotify`]; tests substitute
//! scripted implementations.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Raw candidates requested per fuzzy search.
pub const FUZZY_SEARCH_LIMIT: usize = 20;

/// An image descriptor as returned by the provider, largest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtistImage {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// An artist record from the external provider.  Immutable once fetched;
/// shared read-only by the engine, review session, updater and cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateArtist {
    pub id: String,
    pub name: String,
    pub genres: Vec<String>,
    /// Provider popularity, 0..=100.
    pub popularity: u32,
    pub followers: u64,
    pub images: Vec<ArtistImage>,
    pub profile_url: String,
}

impl CandidateArtist {
    /// URL of the primary (first) image, if any.
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(|i| i.url.as_str())
    }
}

/// Fraction of metadata fields present on a candidate: genres, images,
/// popularity and followers each count one quarter.
pub fn metadata_completeness(artist: &CandidateArtist) -> f64 {
    let present = [
        !artist.genres.is_empty(),
        !artist.images.is_empty(),
        artist.popularity > 0,
        artist.followers > 0,
    ]
    .iter()
    .filter(|&&p| p)
    .count();
    present as f64 / 4.0
}

/// Capability interface for the external metadata service.
///
/// Methods take `&mut self` because concrete clients own mutable state
/// (result cache, rate limiter, auth token) and the whole pipeline is
/// single-threaded.
pub trait MetadataProvider {
    /// Search restricted to exact-normalized-name matches, sorted by
    /// popularity descending.
    fn search_exact(&mut self, name: &str) -> Result<Vec<CandidateArtist>>;

    /// Unrestricted name search, up to `limit` raw candidates.
    fn search_fuzzy(&mut self, name: &str, limit: usize) -> Result<Vec<CandidateArtist>>;

    /// Fetch a single artist by provider id.
    fn fetch_by_id(&mut self, id: &str) -> Result<Option<CandidateArtist>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(genres: Vec<&str>, images: usize, popularity: u32, followers: u64) -> CandidateArtist {
        CandidateArtist {
            id: "id".into(),
            name: "name".into(),
            genres: genres.into_iter().map(String::from).collect(),
            popularity,
            followers,
            images: (0..images)
                .map(|i| ArtistImage { url: format!("img{}", i), width: None, height: None })
                .collect(),
            profile_url: String::new(),
        }
    }

    #[test]
    fn test_completeness_full() {
        assert_eq!(metadata_completeness(&artist(vec!["rock"], 1, 80, 1000)), 1.0);
    }

    #[test]
    fn test_completeness_empty() {
        assert_eq!(metadata_completeness(&artist(vec![], 0, 0, 0)), 0.0);
    }

    #[test]
    fn test_completeness_partial() {
        assert_eq!(metadata_completeness(&artist(vec!["rock"], 0, 50, 0)), 0.5);
        assert_eq!(metadata_completeness(&artist(vec![], 1, 0, 0)), 0.25);
    }
}
