//! Applies accepted review decisions back to the local library.
//!
//! Only decisions that carry a chosen candidate are applied; no-match
//! verdicts count as skipped.  One artist's failure never stops the batch,
//! and a cancellation flag (wired to Ctrl-C in the binary) stops issuing new
//! updates while keeping the stats gathered so far.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::ledger::{Decision, DecisionAction};
use crate::library::{ArtistUpdate, LocalLibrary};
use crate::provider::CandidateArtist;

#[derive(Debug, Clone)]
pub struct UpdateStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub images_updated: usize,
    pub metadata_updated: usize,
    pub bios_updated: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl UpdateStats {
    pub fn success_rate(&self) -> f64 {
        let attempted = self.successful + self.failed;
        if attempted == 0 {
            return 0.0;
        }
        self.successful as f64 / attempted as f64 * 100.0
    }

    /// Rendered summary block for the console.
    pub fn summary(&self) -> String {
        let duration = (self.completed_at - self.started_at).num_seconds();
        format!(
            "=== Update Summary ===\n\
             Total decisions:   {}\n\
             Successful:        {}\n\
             Failed:            {}\n\
             Skipped:           {}\n\
             Metadata updated:  {}\n\
             Biographies:       {}\n\
             Images:            {}\n\
             Success rate:      {:.1}%\n\
             Duration:          {}s",
            self.total,
            self.successful,
            self.failed,
            self.skipped,
            self.metadata_updated,
            self.bios_updated,
            self.images_updated,
            self.success_rate(),
            duration,
        )
    }
}

pub struct UpdateApplier;

impl UpdateApplier {
    /// Apply every accepted decision to the library.
    pub fn apply<L: LocalLibrary + ?Sized>(
        decisions: &BTreeMap<String, Decision>,
        library: &mut L,
        cancel: &AtomicBool,
    ) -> UpdateStats {
        let started_at = Utc::now();
        let mut stats = UpdateStats {
            total: decisions.len(),
            successful: 0,
            failed: 0,
            skipped: 0,
            images_updated: 0,
            metadata_updated: 0,
            bios_updated: 0,
            started_at,
            completed_at: started_at,
        };

        for (rating_key, decision) in decisions {
            if cancel.load(Ordering::SeqCst) {
                log::warn!("Update cancelled, stopping before {:?}", decision.local_title);
                break;
            }

            let accepted = matches!(
                decision.action,
                DecisionAction::AcceptPrimary
                    | DecisionAction::AcceptAlternative
                    | DecisionAction::ManualMatch
            );
            let candidate = match (&decision.chosen, accepted) {
                (Some(candidate), true) => candidate,
                _ => {
                    stats.skipped += 1;
                    continue;
                }
            };

            let update = build_update(candidate);
            match library.apply_update(rating_key, &update) {
                Ok(()) => {
                    stats.successful += 1;
                    stats.metadata_updated += 1;
                    stats.bios_updated += 1;
                    if update.image_url.is_some() {
                        stats.images_updated += 1;
                    }
                    log::info!("Updated {:?} -> {:?}", decision.local_title, candidate.name);
                }
                Err(e) => {
                    stats.failed += 1;
                    log::error!("Failed to update {:?}: {}", decision.local_title, e);
                }
            }
        }

        stats.completed_at = Utc::now();
        stats
    }
}

/// Build the field set written back to the library for one candidate.
pub fn build_update(candidate: &CandidateArtist) -> ArtistUpdate {
    ArtistUpdate {
        name: candidate.name.clone(),
        genres: candidate.genres.clone(),
        biography: build_biography(candidate),
        image_url: candidate.primary_image().map(String::from),
    }
}

/// Deterministic biography assembled from whatever metadata is present.
pub fn build_biography(candidate: &CandidateArtist) -> String {
    let mut sentences = Vec::new();

    if candidate.genres.is_empty() {
        sentences.push(format!("{} is a recording artist.", candidate.name));
    } else {
        let genres: Vec<&str> = candidate.genres.iter().take(3).map(String::as_str).collect();
        sentences.push(format!("{} is a {} artist.", candidate.name, genres.join(", ")));
    }

    if candidate.popularity > 0 {
        let tier = if candidate.popularity < 40 {
            "a rising"
        } else if candidate.popularity < 70 {
            "a popular"
        } else {
            "a highly popular"
        };
        sentences.push(format!(
            "They are {} act with a popularity score of {}/100 on streaming platforms.",
            tier, candidate.popularity
        ));
    }

    if candidate.followers > 0 {
        sentences.push(format!(
            "They have {} followers.",
            with_thousands_separators(candidate.followers)
        ));
    }

    sentences.join(" ")
}

fn with_thousands_separators(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SyncError};
    use crate::library::LocalArtist;
    use crate::provider::ArtistImage;

    struct MockLibrary {
        applied: Vec<(String, ArtistUpdate)>,
        fail_on: Option<String>,
    }

    impl MockLibrary {
        fn new() -> Self {
            MockLibrary { applied: Vec::new(), fail_on: None }
        }
    }

    impl LocalLibrary for MockLibrary {
        fn list_unmatched(&mut self) -> Result<Vec<LocalArtist>> {
            Ok(Vec::new())
        }

        fn apply_update(&mut self, rating_key: &str, update: &ArtistUpdate) -> Result<()> {
            if self.fail_on.as_deref() == Some(rating_key) {
                return Err(SyncError::Provider("server rejected update".into()));
            }
            self.applied.push((rating_key.to_string(), update.clone()));
            Ok(())
        }
    }

    fn candidate(name: &str, genres: Vec<&str>, popularity: u32, followers: u64) -> CandidateArtist {
        CandidateArtist {
            id: "id".into(),
            name: name.into(),
            genres: genres.into_iter().map(String::from).collect(),
            popularity,
            followers,
            images: vec![ArtistImage { url: "http://img".into(), width: None, height: None }],
            profile_url: String::new(),
        }
    }

    fn decision(action: DecisionAction, chosen: Option<CandidateArtist>) -> Decision {
        Decision {
            local_title: "Artist".into(),
            action,
            chosen,
            reason: None,
            search_term: None,
            confidence: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_biography_is_deterministic_and_complete() {
        let c = candidate("Radiohead", vec!["alternative rock", "art rock"], 82, 1234567);
        assert_eq!(
            build_biography(&c),
            "Radiohead is a alternative rock, art rock artist. \
             They are a highly popular act with a popularity score of 82/100 on streaming platforms. \
             They have 1,234,567 followers."
        );
    }

    #[test]
    fn test_biography_falls_back_without_metadata() {
        let mut c = candidate("Unknown", vec![], 0, 0);
        c.images.clear();
        assert_eq!(build_biography(&c), "Unknown is a recording artist.");
    }

    #[test]
    fn test_popularity_tiers() {
        assert!(build_biography(&candidate("A", vec![], 39, 0)).contains("a rising act"));
        assert!(build_biography(&candidate("A", vec![], 40, 0)).contains("a popular act"));
        assert!(build_biography(&candidate("A", vec![], 70, 0)).contains("a highly popular act"));
    }

    #[test]
    fn test_thousands_separators() {
        assert_eq!(with_thousands_separators(0), "0");
        assert_eq!(with_thousands_separators(999), "999");
        assert_eq!(with_thousands_separators(1000), "1,000");
        assert_eq!(with_thousands_separators(1234567), "1,234,567");
    }

    #[test]
    fn test_one_failure_does_not_stop_the_batch() {
        let mut library = MockLibrary::new();
        library.fail_on = Some("k2".to_string());

        let mut decisions = BTreeMap::new();
        decisions.insert(
            "k1".into(),
            decision(DecisionAction::AcceptPrimary, Some(candidate("A", vec!["rock"], 80, 100))),
        );
        decisions.insert(
            "k2".into(),
            decision(DecisionAction::AcceptAlternative, Some(candidate("B", vec![], 10, 0))),
        );
        decisions.insert(
            "k3".into(),
            decision(DecisionAction::ManualMatch, Some(candidate("C", vec!["jazz"], 55, 5000))),
        );
        decisions.insert("k4".into(), decision(DecisionAction::NoMatch, None));

        let cancel = AtomicBool::new(false);
        let stats = UpdateApplier::apply(&decisions, &mut library, &cancel);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.images_updated, 2);
        assert_eq!(library.applied.len(), 2);
        assert!((stats.success_rate() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_cancellation_stops_new_updates() {
        let mut library = MockLibrary::new();
        let mut decisions = BTreeMap::new();
        for i in 0..3 {
            decisions.insert(
                format!("k{}", i),
                decision(DecisionAction::AcceptPrimary, Some(candidate("A", vec![], 50, 10))),
            );
        }

        let cancel = AtomicBool::new(true);
        let stats = UpdateApplier::apply(&decisions, &mut library, &cancel);
        assert_eq!(stats.successful, 0);
        assert_eq!(stats.failed, 0);
        assert!(library.applied.is_empty());
    }

    #[test]
    fn test_update_carries_primary_image() {
        let c = candidate("A", vec!["pop"], 60, 100);
        let update = build_update(&c);
        assert_eq!(update.image_url.as_deref(), Some("http://img"));
        assert_eq!(update.genres, vec!["pop"]);
        assert_eq!(update.name, "A");
    }
}
