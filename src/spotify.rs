//! Spotify Web API client implementing the [`MetadataProvider`] boundary.
//!
//! Uses the client-credentials flow: a consumer id + secret is exchanged for
//! a short-lived bearer token, refreshed on expiry.  All search traffic goes
//! through an owned [`CandidateCache`] (keyed by normalized name and search
//! kind) and an owned [`RateLimiter`].  HTTP 429 responses are honored with
//! their `Retry-After` duration and retried a bounded number of times before
//! surfacing as [`SyncError::RateLimited`].

use std::thread;
use std::time::{Duration, Instant};

use base64::Engine;
use serde::Deserialize;

use crate::cache::CandidateCache;
use crate::config::{CacheConfig, SpotifyConfig};
use crate::error::{Result, SyncError};
use crate::normalize::normalize;
use crate::provider::{ArtistImage, CandidateArtist, MetadataProvider, FUZZY_SEARCH_LIMIT};
use crate::rate_limiter::RateLimiter;

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const USER_AGENT: &str = "artistsync/0.1 (+https://github.com/artistsync/artistsync)";

/// Attempts per request before a rate-limit signal is surfaced.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

// ── API response types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    artists: ArtistPage,
}

#[derive(Debug, Deserialize)]
struct ArtistPage {
    items: Vec<ApiArtist>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    id: String,
    name: String,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    popularity: u32,
    #[serde(default)]
    followers: ApiFollowers,
    #[serde(default)]
    images: Vec<ApiImage>,
    #[serde(default)]
    external_urls: ApiExternalUrls,
}

#[derive(Debug, Deserialize, Default)]
struct ApiFollowers {
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiExternalUrls {
    #[serde(default)]
    spotify: String,
}

impl From<ApiArtist> for CandidateArtist {
    fn from(a: ApiArtist) -> Self {
        CandidateArtist {
            id: a.id,
            name: a.name,
            genres: a.genres,
            popularity: a.popularity.min(100),
            followers: a.followers.total,
            images: a
                .images
                .into_iter()
                .map(|i| ArtistImage { url: i.url, width: i.width, height: i.height })
                .collect(),
            profile_url: a.external_urls.spotify,
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────────────

pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    agent: ureq::Agent,
    token: Option<BearerToken>,
    cache: CandidateCache,
    rate_limiter: RateLimiter,
}

struct BearerToken {
    value: String,
    expires_at: Instant,
}

impl SpotifyClient {
    pub fn new(spotify: &SpotifyConfig, cache: &CacheConfig) -> Self {
        SpotifyClient {
            client_id: spotify.client_id.clone(),
            client_secret: spotify.client_secret.clone(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(15))
                .user_agent(USER_AGENT)
                .build(),
            token: None,
            cache: CandidateCache::new(cache.timeout(), cache.max_entries),
            // Spotify quota: 25 requests per 30 s window, 50 ms spacing.
            rate_limiter: RateLimiter::new(
                "Spotify",
                Duration::from_millis(50),
                25,
                Duration::from_secs(30),
            ),
        }
    }

    /// Verify credentials and reachability with a throwaway search.
    pub fn test_connection(&mut self) -> Result<()> {
        let results = self.search_fuzzy("The Beatles", 1)?;
        if results.is_empty() {
            return Err(SyncError::Connectivity {
                service: "Spotify".to_string(),
                message: "search returned no results for a well-known artist".to_string(),
            });
        }
        Ok(())
    }

    fn bearer(&mut self) -> Result<String> {
        if let Some(token) = &self.token {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }
        self.refresh_token()
    }

    fn refresh_token(&mut self) -> Result<String> {
        let basic = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .agent
            .post(TOKEN_URL)
            .set("Authorization", &format!("Basic {}", basic))
            .send_form(&[("grant_type", "client_credentials")])
            .map_err(|e| SyncError::Connectivity {
                service: "Spotify".to_string(),
                message: format!("token request failed: {}", e),
            })?;

        let token: TokenResponse = response.into_json().map_err(|e| SyncError::Connectivity {
            service: "Spotify".to_string(),
            message: format!("bad token response: {}", e),
        })?;

        log::debug!("[Spotify] access token refreshed, valid {}s", token.expires_in);

        let value = token.access_token.clone();
        // Refresh a minute early so in-flight batches never race expiry.
        let margin = token.expires_in.saturating_sub(60);
        self.token = Some(BearerToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(margin.max(30)),
        });
        Ok(value)
    }

    /// Perform a GET with rate limiting, 429 retry and one 401 token refresh.
    fn get_json<T: for<'de> Deserialize<'de>>(&mut self, url: &str) -> Result<Option<T>> {
        let mut refreshed = false;
        let mut attempts = 0u32;

        loop {
            self.rate_limiter.wait_if_needed();
            let bearer = self.bearer()?;

            let result = self
                .agent
                .get(url)
                .set("Authorization", &format!("Bearer {}", bearer))
                .call();

            match result {
                Ok(response) => {
                    self.rate_limiter.report_success();
                    let parsed: T = response
                        .into_json()
                        .map_err(|e| SyncError::Provider(format!("bad response body: {}", e)))?;
                    return Ok(Some(parsed));
                }
                Err(ureq::Error::Status(404, _)) => return Ok(None),
                Err(ureq::Error::Status(401, _)) if !refreshed => {
                    refreshed = true;
                    self.refresh_token()?;
                }
                Err(ureq::Error::Status(429, response)) => {
                    self.rate_limiter.report_failure();
                    let retry_after = response
                        .header("Retry-After")
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(2);
                    let wait = Duration::from_secs(retry_after);
                    attempts += 1;
                    if attempts >= MAX_RATE_LIMIT_RETRIES {
                        return Err(SyncError::RateLimited(wait));
                    }
                    log::warn!("[Spotify] rate limited, retrying in {}s", retry_after);
                    thread::sleep(wait);
                }
                Err(ureq::Error::Status(code, response)) => {
                    self.rate_limiter.report_failure();
                    let body = response.into_string().unwrap_or_default();
                    return Err(SyncError::Provider(format!("HTTP {}: {}", code, body)));
                }
                Err(e) => {
                    self.rate_limiter.report_failure();
                    return Err(SyncError::Connectivity {
                        service: "Spotify".to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    /// Raw artist search.  `quoted` wraps the name in an `artist:"…"` field
    /// query which Spotify treats as a stricter match.
    fn search_raw(&mut self, name: &str, limit: usize, quoted: bool) -> Result<Vec<CandidateArtist>> {
        let query = if quoted {
            format!("artist:\"{}\"", name)
        } else {
            name.to_string()
        };
        let url = format!(
            "{}/search?q={}&type=artist&limit={}",
            API_BASE,
            urlencoding::encode(&query),
            limit.clamp(1, 50)
        );

        let response: Option<SearchResponse> = self.get_json(&url)?;
        let items = response.map(|r| r.artists.items).unwrap_or_default();

        // Deduplicate by id, preserving provider order.
        let mut seen = std::collections::HashSet::new();
        let candidates = items
            .into_iter()
            .filter(|a| seen.insert(a.id.clone()))
            .map(CandidateArtist::from)
            .collect();
        Ok(candidates)
    }
}

impl MetadataProvider for SpotifyClient {
    fn search_exact(&mut self, name: &str) -> Result<Vec<CandidateArtist>> {
        let norm = normalize(name);
        let cache_key = format!("exact:{}", norm);
        if let Some(hit) = self.cache.get(&cache_key) {
            log::debug!("[Spotify] cache hit for exact search {:?}", name);
            return Ok(hit);
        }

        let raw = self.search_raw(name, FUZZY_SEARCH_LIMIT, true)?;
        let mut exact: Vec<CandidateArtist> = raw
            .into_iter()
            .filter(|c| normalize(&c.name) == norm)
            .collect();
        exact.sort_by(|a, b| b.popularity.cmp(&a.popularity));

        self.cache.insert(cache_key, exact.clone());
        Ok(exact)
    }

    fn search_fuzzy(&mut self, name: &str, limit: usize) -> Result<Vec<CandidateArtist>> {
        let cache_key = format!("fuzzy:{}:{}", limit, normalize(name));
        if let Some(hit) = self.cache.get(&cache_key) {
            log::debug!("[Spotify] cache hit for fuzzy search {:?}", name);
            return Ok(hit);
        }

        let results = self.search_raw(name, limit, false)?;
        self.cache.insert(cache_key, results.clone());
        Ok(results)
    }

    fn fetch_by_id(&mut self, id: &str) -> Result<Option<CandidateArtist>> {
        let url = format!("{}/artists/{}", API_BASE, urlencoding::encode(id));
        let artist: Option<ApiArtist> = self.get_json(&url)?;
        Ok(artist.map(CandidateArtist::from))
    }
}
