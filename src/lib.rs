pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod library;
pub mod normalize;
pub mod plex;
pub mod provider;
pub mod rate_limiter;
pub mod review;
pub mod sessions;
pub mod similarity;
pub mod spotify;
pub mod updater;

pub use config::Config;
pub use engine::{blended_confidence, match_summary_string, MatchBuckets, MatchEngine, MatchResult};
pub use error::{Result, SyncError};
pub use ledger::{Decision, DecisionAction, DecisionLedger, DecisionStore};
pub use library::{ArtistUpdate, LocalArtist, LocalLibrary};
pub use normalize::normalize;
pub use plex::PlexLibrary;
pub use provider::{metadata_completeness, CandidateArtist, MetadataProvider};
pub use review::ReviewSession;
pub use sessions::{DecisionFileStore, ResultsStore};
pub use spotify::SpotifyClient;
pub use updater::{build_biography, UpdateApplier, UpdateStats};
