use std::io::{self, BufRead, Write};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use artistsync::{
    match_summary_string, Config, DecisionFileStore, DecisionLedger, LocalLibrary, MatchBuckets,
    MatchEngine, PlexLibrary, ResultsStore, ReviewSession, SpotifyClient, SyncError, UpdateApplier,
};

fn print_usage() {
    println!("Match local music-library artists against an external metadata provider");
    println!();
    println!("Usage: artistsync [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <PATH>          Configuration file (default: artistsync.toml,");
    println!("                           then ~/.config/artistsync/config.toml)");
    println!("  --help                   Show this help");
}

fn parse_args() -> Result<Option<std::path::PathBuf>, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--config" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "--config requires a path".to_string())?;
                config_path = Some(std::path::PathBuf::from(value));
            }
            other => return Err(format!("unknown option: {}", other)),
        }
        i += 1;
    }
    Ok(config_path)
}

fn fatal(e: &SyncError) -> ! {
    log::error!("{}", e);
    process::exit(1);
}

fn read_choice(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
    line.trim().to_string()
}

fn main() {
    colog::init();

    let config_path = match parse_args() {
        Ok(path) => path,
        Err(message) => {
            eprintln!("{}", message);
            print_usage();
            process::exit(1);
        }
    };

    let config = match config_path {
        Some(path) => Config::load_from(&path),
        None => Config::load(),
    }
    .unwrap_or_else(|e| fatal(&e));

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        if let Err(e) = ctrlc::set_handler(move || {
            cancel.store(true, Ordering::SeqCst);
        }) {
            log::warn!("Could not install Ctrl-C handler: {}", e);
        }
    }

    println!("=== Artist Metadata Sync ===");

    // Connect and verify both boundaries before any matching work.
    let mut library = PlexLibrary::new(&config.plex);
    if let Err(e) = library.test_connection() {
        fatal(&e);
    }
    let mut provider = SpotifyClient::new(&config.spotify, &config.cache);
    if let Err(e) = provider.test_connection() {
        fatal(&e);
    }

    let artists = library.list_unmatched().unwrap_or_else(|e| fatal(&e));
    if artists.is_empty() {
        println!("All artists already have provider metadata. Nothing to do.");
        return;
    }
    println!("Found {} artists without provider metadata.", artists.len());

    let buckets = {
        let mut engine = MatchEngine::new(&mut provider, config.matching.clone());
        engine.process_all(&artists)
    };

    show_previews(&buckets);

    let store = DecisionFileStore::new(&config.sessions.dir);
    let mut ledger = DecisionLedger::new(store);

    // Offer to queue every automatic match straight away.
    if !buckets.matched.is_empty() {
        let answer = read_choice(&format!(
            "Accept all {} automatic matches now? [y/n]: ",
            buckets.matched.len()
        ));
        if answer == "y" {
            for result in &buckets.matched {
                if let Some(best) = &result.best {
                    ledger.record(
                        &result.artist.rating_key,
                        &result.artist.title,
                        artistsync::DecisionAction::AcceptPrimary,
                        Some(best.clone()),
                        Some(result.confidence),
                        None,
                    );
                }
            }
            println!("Queued {} automatic matches.", buckets.matched.len());
        }
    }

    loop {
        println!();
        println!("=== Main Menu ===");
        println!("1. Review matches");
        println!("2. Apply accepted decisions to the library");
        println!("3. Save match results");
        println!("4. Exit");

        match read_choice("Choice: ").as_str() {
            "1" => {
                let stdin = io::stdin();
                let result = {
                    let mut session = ReviewSession::new(
                        stdin.lock(),
                        io::stdout(),
                        &mut provider,
                        &mut ledger,
                    );
                    session.run(&buckets)
                };
                if let Err(e) = result {
                    log::error!("Review session ended with an error: {}", e);
                }
            }
            "2" => {
                if ledger.is_empty() {
                    println!("No decisions recorded yet. Review matches first.");
                    continue;
                }
                cancel.store(false, Ordering::SeqCst);
                let stats = UpdateApplier::apply(ledger.decisions(), &mut library, &cancel);
                println!("{}", stats.summary());
            }
            "3" => {
                let results_store = ResultsStore::new(&config.sessions.dir);
                match results_store.save(buckets.clone()) {
                    Ok(path) => println!("Results saved to {}", path.display()),
                    Err(e) => log::error!("Could not save results: {}", e),
                }
            }
            "4" | "" => {
                if ledger.unsaved_count() > 0 {
                    let answer = read_choice(&format!(
                        "{} unsaved decisions. Save before exiting? [y/n]: ",
                        ledger.unsaved_count()
                    ));
                    if answer == "y" {
                        match ledger.persist() {
                            Ok(path) => println!("Saved to {}", path.display()),
                            Err(e) => log::error!("Save failed: {}", e),
                        }
                    }
                }
                return;
            }
            other => println!("Unknown choice: {:?}", other),
        }
    }
}

fn show_previews(buckets: &MatchBuckets) {
    const PREVIEW: usize = 3;

    println!();
    println!("=== Matching Summary ===");
    println!("Automatic matches: {}", buckets.matched.len());
    println!("Needs review:      {}", buckets.needs_review.len());
    println!("No match found:    {}", buckets.no_match.len());

    for (label, bucket) in [
        ("Automatic matches", &buckets.matched),
        ("Needs review", &buckets.needs_review),
        ("No match", &buckets.no_match),
    ] {
        if bucket.is_empty() {
            continue;
        }
        println!();
        println!("--- {} (showing {} of {}) ---", label, bucket.len().min(PREVIEW), bucket.len());
        for result in bucket.iter().take(PREVIEW) {
            println!("{}", match_summary_string(result));
            println!();
        }
    }
}
