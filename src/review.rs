//! Interactive review session for uncertain, automatic and no-match results.
//!
//! Strictly sequential: every prompt blocks on operator input.  Generic over
//! the input reader and output writer so tests can script the operator and
//! capture the transcript, and over the provider so manual search works
//! against a fake.  Every terminal choice records at most one decision in
//! the ledger.

use std::io::{BufRead, Write};

use crossterm::style::Stylize;

use crate::engine::{MatchBuckets, MatchResult};
use crate::error::Result;
use crate::ledger::{DecisionAction, DecisionLedger, DecisionStore};
use crate::library::LocalArtist;
use crate::provider::{metadata_completeness, CandidateArtist, MetadataProvider, FUZZY_SEARCH_LIMIT};

const BATCH_SIZE: usize = 5;
const RESUME_CHOICES: usize = 5;

pub struct ReviewSession<'a, R, W, P, S>
where
    R: BufRead,
    W: Write,
    P: MetadataProvider + ?Sized,
    S: DecisionStore,
{
    input: R,
    out: W,
    provider: &'a mut P,
    ledger: &'a mut DecisionLedger<S>,
}

impl<'a, R, W, P, S> ReviewSession<'a, R, W, P, S>
where
    R: BufRead,
    W: Write,
    P: MetadataProvider + ?Sized,
    S: DecisionStore,
{
    pub fn new(input: R, out: W, provider: &'a mut P, ledger: &'a mut DecisionLedger<S>) -> Self {
        ReviewSession { input, out, provider, ledger }
    }

    /// Entry point: offer to resume a saved session, then run the menu loop.
    pub fn run(&mut self, buckets: &MatchBuckets) -> Result<()> {
        self.offer_resume()?;

        loop {
            writeln!(self.out)?;
            writeln!(self.out, "{}", "=== Review Menu ===".bold())?;
            writeln!(self.out, "1. Review uncertain matches ({})", buckets.needs_review.len())?;
            writeln!(self.out, "2. Review automatic matches ({})", buckets.matched.len())?;
            writeln!(self.out, "3. Review unmatched artists ({})", buckets.no_match.len())?;
            writeln!(self.out, "4. Batch review uncertain matches")?;
            writeln!(self.out, "5. Save progress")?;
            writeln!(self.out, "6. Statistics")?;
            writeln!(self.out, "7. Exit review")?;
            write!(self.out, "Choice: ")?;
            self.out.flush()?;

            match self.read_line()?.as_str() {
                "1" => self.uncertain_review(&buckets.needs_review)?,
                "2" => self.bucket_review(&buckets.matched, "automatic matches")?,
                "3" => self.no_match_review(&buckets.no_match)?,
                "4" => self.batch_review(&buckets.needs_review)?,
                "5" => self.save_progress()?,
                "6" => self.statistics()?,
                "7" | "" => {
                    if self.confirm_exit()? {
                        return Ok(());
                    }
                }
                other => writeln!(self.out, "Unknown choice: {:?}", other)?,
            }
        }
    }

    fn offer_resume(&mut self) -> Result<()> {
        let sessions = self.ledger.sessions()?;
        if sessions.is_empty() {
            return Ok(());
        }

        writeln!(self.out, "Previous review sessions:")?;
        for (i, session) in sessions.iter().take(RESUME_CHOICES).enumerate() {
            writeln!(self.out, "  {}. {}", i + 1, session.name)?;
        }
        write!(self.out, "Resume a session (1-{}) or Enter for a fresh start: ", sessions.len().min(RESUME_CHOICES))?;
        self.out.flush()?;

        let choice = self.read_line()?;
        if let Ok(n) = choice.parse::<usize>() {
            if n >= 1 && n <= sessions.len().min(RESUME_CHOICES) {
                let path = sessions[n - 1].path.clone();
                match self.ledger.restore(&path) {
                    Ok(count) => writeln!(self.out, "Resumed {} decisions from {}", count, sessions[n - 1].name)?,
                    Err(e) => writeln!(self.out, "{} {}", "Could not resume:".red(), e)?,
                }
            }
        }
        Ok(())
    }

    // ── Uncertain review ─────────────────────────────────────────────────────

    fn uncertain_review(&mut self, results: &[MatchResult]) -> Result<()> {
        if results.is_empty() {
            writeln!(self.out, "Nothing to review.")?;
            return Ok(());
        }

        for (i, result) in results.iter().enumerate() {
            writeln!(self.out)?;
            writeln!(self.out, "[{}/{}]", i + 1, results.len())?;
            self.show_result(result)?;
            if !self.decide_one(result)? {
                break;
            }
        }
        Ok(())
    }

    /// Prompt for one result.  Returns false when the operator quits the
    /// pass.
    fn decide_one(&mut self, result: &MatchResult) -> Result<bool> {
        loop {
            write!(
                self.out,
                "[a]ccept / alternative number / [s]earch manually / [n]o match / [k] skip / [q]uit pass: "
            )?;
            self.out.flush()?;

            let choice = self.read_line()?;
            match choice.as_str() {
                "a" => {
                    if let Some(best) = &result.best {
                        self.ledger.record(
                            &result.artist.rating_key,
                            &result.artist.title,
                            DecisionAction::AcceptPrimary,
                            Some(best.clone()),
                            Some(result.confidence),
                            None,
                        );
                        writeln!(self.out, "{}", "Accepted.".green())?;
                    } else {
                        writeln!(self.out, "No candidate to accept.")?;
                        continue;
                    }
                    return Ok(true);
                }
                "s" => {
                    self.manual_search(&result.artist)?;
                    return Ok(true);
                }
                "n" => {
                    self.ledger.record(
                        &result.artist.rating_key,
                        &result.artist.title,
                        DecisionAction::NoMatch,
                        None,
                        None,
                        None,
                    );
                    writeln!(self.out, "Marked as no match.")?;
                    return Ok(true);
                }
                "k" | "" => return Ok(true),
                "q" => return Ok(false),
                other => match other.parse::<usize>() {
                    Ok(n) if n >= 1 && n <= result.alternatives.len() => {
                        let alt = result.alternatives[n - 1].clone();
                        writeln!(self.out, "{} {}", "Chose alternative:".green(), alt.name)?;
                        self.ledger.record(
                            &result.artist.rating_key,
                            &result.artist.title,
                            DecisionAction::AcceptAlternative,
                            Some(alt),
                            None,
                            None,
                        );
                        return Ok(true);
                    }
                    _ => {
                        writeln!(
                            self.out,
                            "Enter a number between 1 and {}.",
                            result.alternatives.len()
                        )?;
                    }
                },
            }
        }
    }

    // ── Automatic / no-match review ──────────────────────────────────────────

    /// Substring search over a bucket, then per-result decisions.
    fn bucket_review(&mut self, results: &[MatchResult], label: &str) -> Result<()> {
        let filtered = self.filter_bucket(results, label)?;
        for result in filtered {
            writeln!(self.out)?;
            self.show_result(&result)?;
            if !self.decide_one(&result)? {
                break;
            }
        }
        Ok(())
    }

    fn no_match_review(&mut self, results: &[MatchResult]) -> Result<()> {
        let filtered = self.filter_bucket(results, "unmatched artists")?;
        for result in filtered {
            writeln!(self.out)?;
            writeln!(self.out, "{}", result.artist.title.as_str().bold())?;
            self.manual_search(&result.artist)?;
        }
        Ok(())
    }

    fn filter_bucket(&mut self, results: &[MatchResult], label: &str) -> Result<Vec<MatchResult>> {
        if results.is_empty() {
            writeln!(self.out, "No {} to review.", label)?;
            return Ok(Vec::new());
        }
        write!(self.out, "Filter {} by name (Enter for all): ", label)?;
        self.out.flush()?;
        let needle = self.read_line()?.to_lowercase();

        let filtered: Vec<MatchResult> = results
            .iter()
            .filter(|r| needle.is_empty() || r.artist.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        writeln!(self.out, "{} of {} selected.", filtered.len(), results.len())?;
        Ok(filtered)
    }

    // ── Manual search ────────────────────────────────────────────────────────

    /// Free-text search loop.  Exact candidates are offered first, then the
    /// fuzzy list.  `0` searches again, `n` marks the artist unavailable on
    /// the provider, an empty line cancels without recording anything.
    fn manual_search(&mut self, artist: &LocalArtist) -> Result<()> {
        let mut term = artist.title.clone();
        loop {
            write!(self.out, "Search for (Enter = {:?}, 'exit' to cancel): ", term)?;
            self.out.flush()?;
            let line = self.read_line()?;
            if line == "exit" {
                return Ok(());
            }
            if !line.is_empty() {
                term = line;
            }

            let mut candidates = self.provider.search_exact(&term)?;
            if candidates.is_empty() {
                candidates = self.provider.search_fuzzy(&term, FUZZY_SEARCH_LIMIT)?;
            }

            if candidates.is_empty() {
                writeln!(self.out, "No results for {:?}.", term)?;
            } else {
                for (i, c) in candidates.iter().enumerate() {
                    writeln!(
                        self.out,
                        "  {}. {} (popularity {}/100, metadata {:.0}%)",
                        i + 1,
                        c.name,
                        c.popularity,
                        metadata_completeness(c) * 100.0
                    )?;
                }
            }
            write!(self.out, "Select (1-{}), 0 = search again, n = not on provider, Enter = cancel: ", candidates.len())?;
            self.out.flush()?;

            let choice = self.read_line()?;
            match choice.as_str() {
                "" => return Ok(()),
                "0" => continue,
                "n" => {
                    self.ledger.record(
                        &artist.rating_key,
                        &artist.title,
                        DecisionAction::NoMatch,
                        None,
                        None,
                        Some(term.clone()),
                    );
                    writeln!(self.out, "Marked as unavailable on the provider.")?;
                    return Ok(());
                }
                other => {
                    if let Ok(k) = other.parse::<usize>() {
                        if k >= 1 && k <= candidates.len() {
                            let chosen = candidates[k - 1].clone();
                            writeln!(self.out, "{} {}", "Matched:".green(), chosen.name)?;
                            self.ledger.record(
                                &artist.rating_key,
                                &artist.title,
                                DecisionAction::ManualMatch,
                                Some(chosen),
                                None,
                                Some(term.clone()),
                            );
                            return Ok(());
                        }
                    }
                    writeln!(self.out, "Invalid selection.")?;
                }
            }
        }
    }

    // ── Batch review ─────────────────────────────────────────────────────────

    fn batch_review(&mut self, results: &[MatchResult]) -> Result<()> {
        if results.is_empty() {
            writeln!(self.out, "Nothing to review.")?;
            return Ok(());
        }

        'batches: for (b, batch) in results.chunks(BATCH_SIZE).enumerate() {
            writeln!(self.out)?;
            writeln!(self.out, "{}", format!("--- Batch {} ---", b + 1).bold())?;
            for result in batch {
                let best = result
                    .best
                    .as_ref()
                    .map(|c| c.name.as_str())
                    .unwrap_or("(no candidate)");
                writeln!(
                    self.out,
                    "  {} -> {} ({:.1}%)",
                    result.artist.title,
                    best,
                    result.confidence * 100.0
                )?;
            }

            loop {
                write!(self.out, "[a]ccept all / [r]eview individually / [s]kip batch / [q]uit batch mode: ")?;
                self.out.flush()?;

                match self.read_line()?.as_str() {
                    "a" => {
                        let mut accepted = 0;
                        for result in batch {
                            if let Some(best) = &result.best {
                                self.ledger.record(
                                    &result.artist.rating_key,
                                    &result.artist.title,
                                    DecisionAction::AcceptPrimary,
                                    Some(best.clone()),
                                    Some(result.confidence),
                                    None,
                                );
                                accepted += 1;
                            }
                        }
                        writeln!(self.out, "Accepted {} matches.", accepted)?;
                        break;
                    }
                    "r" => {
                        for result in batch {
                            writeln!(self.out)?;
                            self.show_result(result)?;
                            if !self.decide_one(result)? {
                                break 'batches;
                            }
                        }
                        break;
                    }
                    "s" => {
                        writeln!(self.out, "Skipped batch.")?;
                        break;
                    }
                    "q" | "" => return Ok(()),
                    other => writeln!(self.out, "Unknown choice: {:?}", other)?,
                }
            }
        }
        Ok(())
    }

    // ── Save / statistics / exit ─────────────────────────────────────────────

    fn save_progress(&mut self) -> Result<()> {
        if self.ledger.is_empty() {
            writeln!(self.out, "No decisions to save yet.")?;
            return Ok(());
        }
        match self.ledger.persist() {
            Ok(path) => writeln!(self.out, "Saved {} decisions to {}", self.ledger.len(), path.display())?,
            Err(e) => writeln!(self.out, "{} {}", "Save failed:".red(), e)?,
        }
        Ok(())
    }

    fn statistics(&mut self) -> Result<()> {
        let total = self.ledger.len();
        writeln!(self.out, "{}", "=== Review Statistics ===".bold())?;
        writeln!(self.out, "Total decisions: {}", total)?;
        for (label, action) in [
            ("Accepted primary", DecisionAction::AcceptPrimary),
            ("Accepted alternative", DecisionAction::AcceptAlternative),
            ("Manual matches", DecisionAction::ManualMatch),
            ("No match", DecisionAction::NoMatch),
        ] {
            let count = self.ledger.list_by_action(action).len();
            let pct = if total == 0 { 0.0 } else { count as f64 / total as f64 * 100.0 };
            writeln!(self.out, "{}: {} ({:.1}%)", label, count, pct)?;
        }
        writeln!(self.out, "Unsaved decisions: {}", self.ledger.unsaved_count())?;
        Ok(())
    }

    /// True when the session should end.
    fn confirm_exit(&mut self) -> Result<bool> {
        if self.ledger.unsaved_count() == 0 {
            return Ok(true);
        }
        write!(
            self.out,
            "{} unsaved decisions. Save before exiting? [y/n]: ",
            self.ledger.unsaved_count()
        )?;
        self.out.flush()?;
        if self.read_line()? == "y" {
            self.save_progress()?;
        }
        Ok(true)
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn show_result(&mut self, result: &MatchResult) -> Result<()> {
        writeln!(self.out, "Local artist:  {}", result.artist.title.as_str().bold())?;
        match &result.best {
            Some(best) => {
                writeln!(self.out, "Best match:    {}", best.name)?;
                writeln!(self.out, "Confidence:    {:.1}%", result.confidence * 100.0)?;
                writeln!(self.out, "Popularity:    {}/100", best.popularity)?;
                if !best.genres.is_empty() {
                    let genres: Vec<&str> = best.genres.iter().take(3).map(String::as_str).collect();
                    writeln!(self.out, "Genres:        {}", genres.join(", "))?;
                }
            }
            None => writeln!(self.out, "Best match:    (none)")?,
        }
        if !result.alternatives.is_empty() {
            writeln!(self.out, "Alternatives:")?;
            for (i, alt) in result.alternatives.iter().enumerate() {
                writeln!(self.out, "  {}. {} (popularity {}/100)", i + 1, alt.name, alt.popularity)?;
            }
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MatchDetails, MatchType};
    use crate::error::Result;
    use crate::ledger::Decision;
    use crate::provider::ArtistImage;
    use crate::sessions::SessionFile;
    use std::collections::{BTreeMap, HashMap};
    use std::io::Cursor;
    use std::path::{Path, PathBuf};

    struct NullStore;

    impl DecisionStore for NullStore {
        fn save(&self, _decisions: &BTreeMap<String, Decision>) -> Result<PathBuf> {
            Ok(PathBuf::from("null.json"))
        }
        fn list_sessions(&self) -> Result<Vec<SessionFile>> {
            Ok(Vec::new())
        }
        fn load(&self, _path: &Path) -> Result<BTreeMap<String, Decision>> {
            Ok(BTreeMap::new())
        }
    }

    struct ScriptedProvider {
        exact: HashMap<String, Vec<CandidateArtist>>,
        fuzzy: HashMap<String, Vec<CandidateArtist>>,
    }

    impl MetadataProvider for ScriptedProvider {
        fn search_exact(&mut self, name: &str) -> Result<Vec<CandidateArtist>> {
            Ok(self.exact.get(name).cloned().unwrap_or_default())
        }
        fn search_fuzzy(&mut self, name: &str, _limit: usize) -> Result<Vec<CandidateArtist>> {
            Ok(self.fuzzy.get(name).cloned().unwrap_or_default())
        }
        fn fetch_by_id(&mut self, _id: &str) -> Result<Option<CandidateArtist>> {
            Ok(None)
        }
    }

    fn candidate(id: &str, name: &str) -> CandidateArtist {
        CandidateArtist {
            id: id.into(),
            name: name.into(),
            genres: vec!["rock".into()],
            popularity: 70,
            followers: 1000,
            images: vec![ArtistImage { url: "img".into(), width: None, height: None }],
            profile_url: String::new(),
        }
    }

    fn result(key: &str, title: &str, best: Option<CandidateArtist>, alts: Vec<CandidateArtist>) -> MatchResult {
        MatchResult {
            artist: LocalArtist {
                rating_key: key.into(),
                title: title.into(),
                original_title: None,
                section_title: "Music".into(),
            },
            confidence: if best.is_some() { 0.85 } else { 0.0 },
            needs_review: best.is_some(),
            best,
            alternatives: alts,
            details: MatchDetails {
                match_type: MatchType::Fuzzy,
                normalized_local: title.to_lowercase(),
                normalized_candidate: None,
                completeness: None,
            },
        }
    }

    fn session<'a>(
        script: &'a str,
        provider: &'a mut ScriptedProvider,
        ledger: &'a mut DecisionLedger<NullStore>,
    ) -> ReviewSession<'a, Cursor<&'a str>, Vec<u8>, ScriptedProvider, NullStore> {
        ReviewSession::new(Cursor::new(script), Vec::new(), provider, ledger)
    }

    #[test]
    fn test_batch_accept_all_records_primary_for_each_best() {
        let mut provider = ScriptedProvider { exact: HashMap::new(), fuzzy: HashMap::new() };
        let mut ledger = DecisionLedger::new(NullStore);

        let results = vec![
            result("k1", "A", Some(candidate("c1", "A!")), vec![]),
            result("k2", "B", Some(candidate("c2", "B!")), vec![]),
            result("k3", "C", None, vec![]),
        ];

        let mut s = session("a\n", &mut provider, &mut ledger);
        s.batch_review(&results).unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get("k1").unwrap().action, DecisionAction::AcceptPrimary);
        assert_eq!(ledger.get("k2").unwrap().action, DecisionAction::AcceptPrimary);
        assert!(ledger.get("k3").is_none());
    }

    #[test]
    fn test_batch_invalid_input_reprompts_instead_of_skipping() {
        let mut provider = ScriptedProvider { exact: HashMap::new(), fuzzy: HashMap::new() };
        let mut ledger = DecisionLedger::new(NullStore);

        let results = vec![result("k1", "A", Some(candidate("c1", "A!")), vec![])];

        // "x" is not a batch choice and must re-prompt; "a" then accepts.
        let mut s = session("x\na\n", &mut provider, &mut ledger);
        s.batch_review(&results).unwrap();

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("k1").unwrap().action, DecisionAction::AcceptPrimary);
    }

    #[test]
    fn test_batch_explicit_skip_records_nothing() {
        let mut provider = ScriptedProvider { exact: HashMap::new(), fuzzy: HashMap::new() };
        let mut ledger = DecisionLedger::new(NullStore);

        let results = vec![result("k1", "A", Some(candidate("c1", "A!")), vec![])];

        let mut s = session("s\n", &mut provider, &mut ledger);
        s.batch_review(&results).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_out_of_range_alternative_reprompts() {
        let mut provider = ScriptedProvider { exact: HashMap::new(), fuzzy: HashMap::new() };
        let mut ledger = DecisionLedger::new(NullStore);

        let r = result(
            "k1",
            "Artist",
            Some(candidate("best", "Best")),
            vec![candidate("alt1", "Alt One"), candidate("alt2", "Alt Two")],
        );

        // "9" is out of range and must re-prompt; "2" then picks Alt Two.
        let mut s = session("9\n2\n", &mut provider, &mut ledger);
        assert!(s.decide_one(&r).unwrap());

        let d = ledger.get("k1").unwrap();
        assert_eq!(d.action, DecisionAction::AcceptAlternative);
        assert_eq!(d.chosen.as_ref().unwrap().id, "alt2");
    }

    #[test]
    fn test_accept_primary_records_confidence() {
        let mut provider = ScriptedProvider { exact: HashMap::new(), fuzzy: HashMap::new() };
        let mut ledger = DecisionLedger::new(NullStore);

        let r = result("k1", "Artist", Some(candidate("best", "Best")), vec![]);
        let mut s = session("a\n", &mut provider, &mut ledger);
        assert!(s.decide_one(&r).unwrap());

        let d = ledger.get("k1").unwrap();
        assert_eq!(d.action, DecisionAction::AcceptPrimary);
        assert_eq!(d.confidence, Some(0.85));
    }

    #[test]
    fn test_skip_records_nothing() {
        let mut provider = ScriptedProvider { exact: HashMap::new(), fuzzy: HashMap::new() };
        let mut ledger = DecisionLedger::new(NullStore);

        let r = result("k1", "Artist", Some(candidate("best", "Best")), vec![]);
        let mut s = session("k\n", &mut provider, &mut ledger);
        assert!(s.decide_one(&r).unwrap());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_manual_search_records_manual_match_with_term() {
        let mut provider = ScriptedProvider { exact: HashMap::new(), fuzzy: HashMap::new() };
        provider
            .fuzzy
            .insert("beatles uk".into(), vec![candidate("b1", "The Beatles")]);
        let mut ledger = DecisionLedger::new(NullStore);

        let artist = LocalArtist {
            rating_key: "k1".into(),
            title: "Betles".into(),
            original_title: None,
            section_title: "Music".into(),
        };

        // Search "beatles uk", pick candidate 1.
        let mut s = session("beatles uk\n1\n", &mut provider, &mut ledger);
        s.manual_search(&artist).unwrap();

        let d = ledger.get("k1").unwrap();
        assert_eq!(d.action, DecisionAction::ManualMatch);
        assert_eq!(d.search_term.as_deref(), Some("beatles uk"));
        assert_eq!(d.chosen.as_ref().unwrap().id, "b1");
    }

    #[test]
    fn test_manual_search_marks_unavailable() {
        let mut provider = ScriptedProvider { exact: HashMap::new(), fuzzy: HashMap::new() };
        let mut ledger = DecisionLedger::new(NullStore);

        let artist = LocalArtist {
            rating_key: "k1".into(),
            title: "Nobody".into(),
            original_title: None,
            section_title: "Music".into(),
        };

        // Accept the default term, no results, mark unavailable.
        let mut s = session("\nn\n", &mut provider, &mut ledger);
        s.manual_search(&artist).unwrap();

        assert_eq!(ledger.get("k1").unwrap().action, DecisionAction::NoMatch);
    }

    #[test]
    fn test_manual_search_zero_searches_again() {
        let mut provider = ScriptedProvider { exact: HashMap::new(), fuzzy: HashMap::new() };
        provider.fuzzy.insert("first".into(), vec![candidate("f", "First")]);
        provider.fuzzy.insert("second".into(), vec![candidate("s", "Second")]);
        let mut ledger = DecisionLedger::new(NullStore);

        let artist = LocalArtist {
            rating_key: "k1".into(),
            title: "X".into(),
            original_title: None,
            section_title: "Music".into(),
        };

        // First query, retry with 0, second query, pick 1.
        let mut s = session("first\n0\nsecond\n1\n", &mut provider, &mut ledger);
        s.manual_search(&artist).unwrap();

        assert_eq!(ledger.get("k1").unwrap().chosen.as_ref().unwrap().id, "s");
        assert_eq!(ledger.get("k1").unwrap().search_term.as_deref(), Some("second"));
    }
}
