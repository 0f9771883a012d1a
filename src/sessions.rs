//! On-disk session artifacts: review-decision files and match-result files.
//!
//! Both are plain pretty-printed JSON so an operator can inspect or edit
//! them by hand.  Filenames embed a `YYYYMMDD_HHMMSS` timestamp and listing
//! sorts by filename descending, which for this format is also
//! most-recent-first.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::MatchBuckets;
use crate::error::{Result, SyncError};
use crate::ledger::{Decision, DecisionStore};

const DECISION_PREFIX: &str = "review_decisions_";
const RESULTS_PREFIX: &str = "match_results_";
const SESSION_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// One saved session file, as offered for resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFile {
    pub path: PathBuf,
    pub name: String,
}

fn list_json_files(dir: &Path, prefix: &str) -> Result<Vec<SessionFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) && name.ends_with(".json") {
            files.push(SessionFile { path: entry.path(), name });
        }
    }
    // Timestamped names sort lexically, so descending is most-recent-first.
    files.sort_by(|a, b| b.name.cmp(&a.name));
    Ok(files)
}

fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
        .map_err(|e| SyncError::Persistence(format!("cannot write {}: {}", path.display(), e)))
}

// ── Decision sessions ────────────────────────────────────────────────────────

/// File-backed [`DecisionStore`] writing one JSON file per review session.
pub struct DecisionFileStore {
    dir: PathBuf,
}

impl DecisionFileStore {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        DecisionFileStore { dir: sessions_dir.into().join("reviews") }
    }

    /// The most recent saved sessions, newest first, for the resume prompt.
    pub fn recent(&self, limit: usize) -> Result<Vec<SessionFile>> {
        let mut sessions = self.list_sessions()?;
        sessions.truncate(limit);
        Ok(sessions)
    }
}

impl DecisionStore for DecisionFileStore {
    fn save(&self, decisions: &BTreeMap<String, Decision>) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            SyncError::Persistence(format!("cannot create {}: {}", self.dir.display(), e))
        })?;
        let stamp = Local::now().format(SESSION_TIME_FORMAT);
        let path = self.dir.join(format!("{}{}.json", DECISION_PREFIX, stamp));
        write_pretty_json(&path, decisions)?;
        Ok(path)
    }

    fn list_sessions(&self) -> Result<Vec<SessionFile>> {
        list_json_files(&self.dir, DECISION_PREFIX)
    }

    fn load(&self, path: &Path) -> Result<BTreeMap<String, Decision>> {
        let content = fs::read_to_string(path)
            .map_err(|e| SyncError::Persistence(format!("cannot read {}: {}", path.display(), e)))?;
        Ok(serde_json::from_str(&content)?)
    }
}

// ── Match results ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultStatistics {
    pub matched: usize,
    pub needs_review: usize,
    pub no_match: usize,
}

/// A full matching run as written to disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedResults {
    pub timestamp: DateTime<Utc>,
    pub total_processed: usize,
    pub statistics: ResultStatistics,
    pub buckets: MatchBuckets,
}

/// Writes and lists whole-run match results.
pub struct ResultsStore {
    dir: PathBuf,
}

impl ResultsStore {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        ResultsStore { dir: sessions_dir.into() }
    }

    pub fn save(&self, buckets: MatchBuckets) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            SyncError::Persistence(format!("cannot create {}: {}", self.dir.display(), e))
        })?;

        let saved = SavedResults {
            timestamp: Utc::now(),
            total_processed: buckets.total(),
            statistics: ResultStatistics {
                matched: buckets.matched.len(),
                needs_review: buckets.needs_review.len(),
                no_match: buckets.no_match.len(),
            },
            buckets,
        };

        let stamp = Local::now().format(SESSION_TIME_FORMAT);
        let path = self.dir.join(format!("{}{}.json", RESULTS_PREFIX, stamp));
        write_pretty_json(&path, &saved)?;
        log::info!("Saved match results to {}", path.display());
        Ok(path)
    }

    pub fn load(&self, path: &Path) -> Result<SavedResults> {
        let content = fs::read_to_string(path)
            .map_err(|e| SyncError::Persistence(format!("cannot read {}: {}", path.display(), e)))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionFile>> {
        list_json_files(&self.dir, RESULTS_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DecisionAction;
    use crate::provider::{ArtistImage, CandidateArtist};
    use tempfile::tempdir;

    #[test]
    fn test_decision_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = DecisionFileStore::new(dir.path());

        let mut decisions = BTreeMap::new();
        decisions.insert(
            "k1".to_string(),
            Decision {
                local_title: "The Beatles".to_string(),
                action: DecisionAction::AcceptPrimary,
                chosen: None,
                reason: None,
                search_term: None,
                confidence: Some(0.97),
                timestamp: Utc::now(),
            },
        );

        let path = store.save(&decisions).unwrap();
        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["k1"].local_title, "The Beatles");
        assert_eq!(loaded["k1"].action, DecisionAction::AcceptPrimary);
    }

    #[test]
    fn test_embedded_candidate_survives_save_and_load_by_field() {
        let dir = tempdir().unwrap();
        let store = DecisionFileStore::new(dir.path());

        let candidate = CandidateArtist {
            id: "4Z8W4fKeB5YxbusRsiQu".to_string(),
            name: "Radiohead".to_string(),
            genres: vec!["alternative rock".to_string(), "art rock".to_string()],
            popularity: 82,
            followers: 7_654_321,
            images: vec![
                ArtistImage {
                    url: "https://img.example/640.jpg".to_string(),
                    width: Some(640),
                    height: Some(640),
                },
                ArtistImage { url: "https://img.example/300.jpg".to_string(), width: None, height: None },
            ],
            profile_url: "https://open.spotify.com/artist/4Z8W4fKeB5YxbusRsiQu".to_string(),
        };

        let mut decisions = BTreeMap::new();
        decisions.insert(
            "k1".to_string(),
            Decision {
                local_title: "Radiohead".to_string(),
                action: DecisionAction::ManualMatch,
                chosen: Some(candidate.clone()),
                reason: None,
                search_term: Some("radiohead uk".to_string()),
                confidence: Some(0.91),
                timestamp: Utc::now(),
            },
        );

        let path = store.save(&decisions).unwrap();
        let loaded = store.load(&path).unwrap();

        let restored = loaded["k1"].chosen.as_ref().expect("candidate must survive the round trip");
        assert_eq!(restored.id, candidate.id);
        assert_eq!(restored.name, candidate.name);
        assert_eq!(restored.genres, candidate.genres);
        assert_eq!(restored.popularity, candidate.popularity);
        assert_eq!(restored.followers, candidate.followers);
        assert_eq!(restored.images, candidate.images);
        assert_eq!(restored.profile_url, candidate.profile_url);
        assert_eq!(loaded["k1"].search_term.as_deref(), Some("radiohead uk"));
        assert_eq!(loaded["k1"].confidence, Some(0.91));
    }

    #[test]
    fn test_sessions_listed_most_recent_first() {
        let dir = tempdir().unwrap();
        let reviews = dir.path().join("reviews");
        fs::create_dir_all(&reviews).unwrap();
        for stamp in ["20250101_120000", "20250301_090000", "20250215_180000"] {
            fs::write(reviews.join(format!("review_decisions_{}.json", stamp)), "{}").unwrap();
        }
        // Unrelated files are ignored.
        fs::write(reviews.join("notes.txt"), "x").unwrap();

        let store = DecisionFileStore::new(dir.path());
        let names: Vec<String> = store.list_sessions().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "review_decisions_20250301_090000.json",
                "review_decisions_20250215_180000.json",
                "review_decisions_20250101_120000.json",
            ]
        );

        let recent = store.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].name, "review_decisions_20250301_090000.json");
    }

    #[test]
    fn test_empty_dir_lists_no_sessions() {
        let dir = tempdir().unwrap();
        let store = DecisionFileStore::new(dir.path());
        assert!(store.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_results_save_records_statistics() {
        let dir = tempdir().unwrap();
        let store = ResultsStore::new(dir.path());

        let buckets = MatchBuckets::default();
        let path = store.save(buckets).unwrap();
        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded.total_processed, 0);
        assert_eq!(loaded.statistics.matched, 0);

        assert_eq!(store.list_sessions().unwrap().len(), 1);
    }
}
