//! Decision ledger for the interactive review session.
//!
//! One entry per local artist, keyed by rating key.  Re-reviewing an artist
//! overwrites the earlier entry, so the ledger always holds the latest
//! verdict.  Every tenth recorded decision is auto-persisted through the
//! injected [`DecisionStore`]; a persist failure is logged and flagged but
//! never aborts the session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::provider::CandidateArtist;
use crate::sessions::SessionFile;

const AUTO_PERSIST_EVERY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    /// The engine's best candidate was accepted as-is.
    AcceptPrimary,
    /// One of the ranked alternatives was chosen instead.
    AcceptAlternative,
    /// A candidate found through manual search was chosen.
    ManualMatch,
    /// The artist is not available on the provider.
    NoMatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub local_title: String,
    pub action: DecisionAction,
    #[serde(default)]
    pub chosen: Option<CandidateArtist>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Query text that produced the match, for manual searches.
    #[serde(default)]
    pub search_term: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Persistence seam for decision sessions, implemented by
/// [`crate::sessions::DecisionFileStore`] and by in-memory fakes in tests.
pub trait DecisionStore {
    fn save(&self, decisions: &BTreeMap<String, Decision>) -> Result<PathBuf>;
    fn list_sessions(&self) -> Result<Vec<SessionFile>>;
    fn load(&self, path: &Path) -> Result<BTreeMap<String, Decision>>;
}

pub struct DecisionLedger<S: DecisionStore> {
    decisions: BTreeMap<String, Decision>,
    store: S,
    recorded_since_save: usize,
}

impl<S: DecisionStore> DecisionLedger<S> {
    pub fn new(store: S) -> Self {
        DecisionLedger {
            decisions: BTreeMap::new(),
            store,
            recorded_since_save: 0,
        }
    }

    /// Record a decision for one artist, stamping the current time and
    /// overwriting any earlier entry for the same rating key.
    pub fn record(
        &mut self,
        rating_key: &str,
        local_title: &str,
        action: DecisionAction,
        chosen: Option<CandidateArtist>,
        confidence: Option<f64>,
        search_term: Option<String>,
    ) {
        let decision = Decision {
            local_title: local_title.to_string(),
            action,
            chosen,
            reason: None,
            search_term,
            confidence,
            timestamp: Utc::now(),
        };
        self.decisions.insert(rating_key.to_string(), decision);
        self.recorded_since_save += 1;

        if self.recorded_since_save >= AUTO_PERSIST_EVERY {
            match self.persist() {
                Ok(path) => log::debug!("Auto-saved review progress to {}", path.display()),
                Err(e) => log::warn!("Auto-save failed, progress kept in memory: {}", e),
            }
        }
    }

    /// Save the full ledger through the store.  Resets the unsaved counter
    /// on success only.
    pub fn persist(&mut self) -> Result<PathBuf> {
        let path = self.store.save(&self.decisions)?;
        self.recorded_since_save = 0;
        Ok(path)
    }

    /// Replace the in-memory ledger with a previously saved session.
    pub fn restore(&mut self, path: &Path) -> Result<usize> {
        self.decisions = self.store.load(path)?;
        self.recorded_since_save = 0;
        Ok(self.decisions.len())
    }

    pub fn sessions(&self) -> Result<Vec<SessionFile>> {
        self.store.list_sessions()
    }

    pub fn get(&self, rating_key: &str) -> Option<&Decision> {
        self.decisions.get(rating_key)
    }

    pub fn decisions(&self) -> &BTreeMap<String, Decision> {
        &self.decisions
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Decisions recorded since the last successful save.
    pub fn unsaved_count(&self) -> usize {
        self.recorded_since_save
    }

    pub fn list_by_action(&self, action: DecisionAction) -> Vec<(&String, &Decision)> {
        self.decisions
            .iter()
            .filter(|(_, d)| d.action == action)
            .collect()
    }
}
