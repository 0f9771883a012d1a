use std::process;

use artistsync::{metadata_completeness, Config, MetadataProvider, SpotifyClient, SyncError};

fn print_usage() {
    println!("Search the metadata provider for an artist and show candidate details");
    println!();
    println!("Usage: artist_search [OPTIONS] <NAME>...");
    println!();
    println!("Options:");
    println!("  --exact                  Restrict to exact normalized-name matches");
    println!("  --id <ID>                Fetch one artist by provider id instead of searching");
    println!("  --config <PATH>          Configuration file");
    println!("  --help                   Show this help");
}

fn fatal(e: &SyncError) -> ! {
    log::error!("{}", e);
    process::exit(1);
}

fn main() {
    colog::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut exact = false;
    let mut by_id = None;
    let mut config_path = None;
    let mut name_parts = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return;
            }
            "--exact" => exact = true,
            "--id" => {
                i += 1;
                match args.get(i) {
                    Some(value) => by_id = Some(value.clone()),
                    None => {
                        eprintln!("--id requires a provider id");
                        process::exit(1);
                    }
                }
            }
            "--config" => {
                i += 1;
                match args.get(i) {
                    Some(value) => config_path = Some(std::path::PathBuf::from(value)),
                    None => {
                        eprintln!("--config requires a path");
                        process::exit(1);
                    }
                }
            }
            other => name_parts.push(other.to_string()),
        }
        i += 1;
    }

    if name_parts.is_empty() && by_id.is_none() {
        print_usage();
        process::exit(1);
    }
    let name = name_parts.join(" ");

    let config = match config_path {
        Some(path) => Config::load_from(&path),
        None => Config::load(),
    }
    .unwrap_or_else(|e| fatal(&e));

    let mut provider = SpotifyClient::new(&config.spotify, &config.cache);

    let results = if let Some(id) = &by_id {
        match provider.fetch_by_id(id).unwrap_or_else(|e| fatal(&e)) {
            Some(artist) => vec![artist],
            None => {
                println!("No artist with id {:?}", id);
                return;
            }
        }
    } else if exact {
        provider.search_exact(&name).unwrap_or_else(|e| fatal(&e))
    } else {
        provider.search_fuzzy(&name, 10).unwrap_or_else(|e| fatal(&e))
    };

    let label = by_id.unwrap_or(name);
    if results.is_empty() {
        println!("No candidates found for {:?}", label);
        return;
    }

    println!("=== Candidates for {:?} ===", label);
    for (i, c) in results.iter().enumerate() {
        println!("{}. {} (id {})", i + 1, c.name, c.id);
        println!("   Popularity: {}/100", c.popularity);
        println!("   Followers:  {}", c.followers);
        println!(
            "   Genres:     {}",
            if c.genres.is_empty() { "(none)".to_string() } else { c.genres.join(", ") }
        );
        println!(
            "   Image:      {}",
            c.primary_image().unwrap_or("(none)")
        );
        println!("   Metadata:   {:.0}% complete", metadata_completeness(c) * 100.0);
    }
}
