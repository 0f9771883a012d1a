//! Matching engine: exact-then-fuzzy search, confidence blending and
//! classification into automatic / needs-review / no-match buckets.
//!
//! The confidence formula is additive on purpose: base name similarity plus
//! a 0.1 popularity bonus plus a 0.1 metadata-completeness bonus, clamped to
//! [0, 1].  The 0.95 / 0.80 thresholds were tuned against exactly this
//! clamped formula, so the theoretical 1.2 ceiling is not re-normalized.

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::MatchingConfig;
use crate::error::Result;
use crate::library::LocalArtist;
use crate::normalize::normalize;
use crate::provider::{metadata_completeness, CandidateArtist, MetadataProvider, FUZZY_SEARCH_LIMIT};
use crate::similarity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Fuzzy,
    None,
}

/// Diagnostic detail attached to every match result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDetails {
    pub match_type: MatchType,
    pub normalized_local: String,
    #[serde(default)]
    pub normalized_candidate: Option<String>,
    /// Fraction of candidate metadata fields present, for fuzzy matches.
    #[serde(default)]
    pub completeness: Option<f64>,
}

/// Outcome of matching one local artist.  Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub artist: LocalArtist,
    pub best: Option<CandidateArtist>,
    pub confidence: f64,
    pub needs_review: bool,
    pub alternatives: Vec<CandidateArtist>,
    pub details: MatchDetails,
}

/// The three disjoint classification buckets.  Together they partition the
/// input exactly once, preserving input order within each bucket.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MatchBuckets {
    pub matched: Vec<MatchResult>,
    pub needs_review: Vec<MatchResult>,
    pub no_match: Vec<MatchResult>,
}

impl MatchBuckets {
    pub fn total(&self) -> usize {
        self.matched.len() + self.needs_review.len() + self.no_match.len()
    }
}

pub struct MatchEngine<'a, P: MetadataProvider + ?Sized> {
    provider: &'a mut P,
    settings: MatchingConfig,
}

impl<'a, P: MetadataProvider + ?Sized> MatchEngine<'a, P> {
    pub fn new(provider: &'a mut P, settings: MatchingConfig) -> Self {
        MatchEngine { provider, settings }
    }

    /// Match every artist, classifying each into exactly one bucket.  One
    /// artist's failure never aborts the batch: provider errors are logged
    /// and route that artist to no-match.
    pub fn process_all(&mut self, artists: &[LocalArtist]) -> MatchBuckets {
        let mut buckets = MatchBuckets::default();
        let total = artists.len();
        let timeout = Duration::from_secs(self.settings.timeout_threshold_secs);
        let delay = Duration::from_millis(self.settings.request_delay_ms);

        log::info!("Starting artist matching for {} artists", total);

        for (i, artist) in artists.iter().enumerate() {
            let started = Instant::now();

            let result = match self.process_one(artist) {
                Ok(result) => {
                    let elapsed = started.elapsed();
                    if elapsed > timeout {
                        log::warn!(
                            "Matching timed out for {:?} (took {:.1}s, threshold {:.0}s); using the result anyway",
                            artist.title,
                            elapsed.as_secs_f64(),
                            timeout.as_secs_f64()
                        );
                    }
                    result
                }
                Err(e) => {
                    log::error!("Error processing artist {:?}: {}", artist.title, e);
                    Self::no_match_result(artist)
                }
            };

            self.classify(result, &mut buckets);

            // Courtesy spacing between artist-level lookups, separate from
            // the per-request rate limiter inside the provider client.
            if !delay.is_zero() && i + 1 < total {
                thread::sleep(delay);
            }
        }

        self.log_summary(&buckets, total);
        buckets
    }

    /// Match a single artist: exact search first, fuzzy fallback second.
    pub fn process_one(&mut self, artist: &LocalArtist) -> Result<MatchResult> {
        let normalized_local = normalize(&artist.title);

        // Exact attempt: normalized-name equality on the provider side.
        let exact = self.provider.search_exact(&artist.title)?;
        if !exact.is_empty() {
            let mut ranked = exact;
            ranked.sort_by(|a, b| b.popularity.cmp(&a.popularity));
            let best = ranked.remove(0);
            ranked.truncate(self.settings.max_alternatives);
            let normalized_candidate = normalize(&best.name);
            return Ok(MatchResult {
                artist: artist.clone(),
                best: Some(best),
                confidence: 1.0,
                needs_review: false,
                alternatives: ranked,
                details: MatchDetails {
                    match_type: MatchType::Exact,
                    normalized_local,
                    normalized_candidate: Some(normalized_candidate),
                    completeness: None,
                },
            });
        }

        // Fuzzy fallback.
        let fuzzy = self.provider.search_fuzzy(&artist.title, FUZZY_SEARCH_LIMIT)?;
        if fuzzy.is_empty() {
            return Ok(Self::no_match_result(artist));
        }

        let mut scored: Vec<(CandidateArtist, f64)> = fuzzy
            .into_iter()
            .map(|candidate| {
                let confidence = blended_confidence(&artist.title, &candidate);
                (candidate, confidence)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.0.popularity.cmp(&a.0.popularity))
        });

        let (best, confidence) = scored.remove(0);
        let alternatives: Vec<CandidateArtist> = scored
            .into_iter()
            .take(self.settings.max_alternatives)
            .map(|(c, _)| c)
            .collect();

        let normalized_candidate = normalize(&best.name);
        let completeness = metadata_completeness(&best);

        Ok(MatchResult {
            artist: artist.clone(),
            best: Some(best),
            confidence,
            needs_review: confidence < self.settings.auto_match_threshold,
            alternatives,
            details: MatchDetails {
                match_type: MatchType::Fuzzy,
                normalized_local,
                normalized_candidate: Some(normalized_candidate),
                completeness: Some(completeness),
            },
        })
    }

    fn no_match_result(artist: &LocalArtist) -> MatchResult {
        MatchResult {
            artist: artist.clone(),
            best: None,
            confidence: 0.0,
            needs_review: false,
            alternatives: Vec::new(),
            details: MatchDetails {
                match_type: MatchType::None,
                normalized_local: normalize(&artist.title),
                normalized_candidate: None,
                completeness: None,
            },
        }
    }

    fn classify(&self, result: MatchResult, buckets: &mut MatchBuckets) {
        if result.best.is_none() {
            buckets.no_match.push(result);
        } else if result.confidence >= self.settings.auto_match_threshold {
            buckets.matched.push(result);
        } else {
            buckets.needs_review.push(result);
        }
    }

    fn log_summary(&self, buckets: &MatchBuckets, total: usize) {
        let pct = |n: usize| {
            if total == 0 { 0.0 } else { n as f64 / total as f64 * 100.0 }
        };
        log::info!("Total artists processed: {}", total);
        log::info!("Automatic matches: {} ({:.1}%)", buckets.matched.len(), pct(buckets.matched.len()));
        log::info!("Needs review: {} ({:.1}%)", buckets.needs_review.len(), pct(buckets.needs_review.len()));
        log::info!("No matches found: {} ({:.1}%)", buckets.no_match.len(), pct(buckets.no_match.len()));

        let low = buckets
            .needs_review
            .iter()
            .filter(|r| r.confidence < self.settings.review_threshold)
            .count();
        if low > 0 {
            log::info!(
                "{} review items fall below the {:.0}% review threshold",
                low,
                self.settings.review_threshold * 100.0
            );
        }
    }
}

/// Blend a candidate's confidence: base name similarity plus popularity and
/// metadata-completeness bonuses, clamped to [0, 1].  An exact normalized
/// name match short-circuits to 1.0 with no blending.
pub fn blended_confidence(local_title: &str, candidate: &CandidateArtist) -> f64 {
    let name = similarity::score(local_title, &candidate.name);
    if name.is_exact {
        return 1.0;
    }
    let popularity_bonus = 0.1 * (candidate.popularity.min(100) as f64 / 100.0);
    let completeness_bonus = 0.1 * metadata_completeness(candidate);
    (name.similarity + popularity_bonus + completeness_bonus).clamp(0.0, 1.0)
}

/// Human-readable rendering of one match result, used by the main flow's
/// per-bucket previews.
pub fn match_summary_string(result: &MatchResult) -> String {
    let best = match &result.best {
        Some(b) => b,
        None => return format!("No match found for: {}", result.artist.title),
    };

    let mut lines = Vec::new();
    lines.push(format!("Local Artist: {}", result.artist.title));
    lines.push(format!("Provider Match: {}", best.name));
    lines.push(format!("Confidence: {:.1}%", result.confidence * 100.0));
    lines.push(format!("Match Type: {:?}", result.details.match_type));
    lines.push(format!("Popularity: {}/100", best.popularity));
    if !best.genres.is_empty() {
        let genres: Vec<&str> = best.genres.iter().take(3).map(String::as_str).collect();
        lines.push(format!("Genres: {}", genres.join(", ")));
    }
    if !result.alternatives.is_empty() {
        lines.push("Alternative matches:".to_string());
        for (i, alt) in result.alternatives.iter().enumerate() {
            lines.push(format!("  {}. {} (popularity {}/100)", i + 1, alt.name, alt.popularity));
        }
    }
    lines.join("\n")
}
