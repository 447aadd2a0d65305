//! Resolve a URL or search query from the command line.
//!
//! ```sh
//! cargo run --example basic_resolve -- "https://www.deezer.com/track/3135556"
//! cargo run --example basic_resolve -- "daft punk one more time"
//! ```

use media_dl::{Config, MediaResolver, Resolution};

#[tokio::main]
async fn main() -> media_dl::Result<()> {
    let input = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("usage: basic_resolve <url-or-query>");
        std::process::exit(2);
    });

    let resolver = MediaResolver::new(Config::default())?;

    match resolver.resolve(&input).await? {
        Resolution::Media(retrieved) => {
            println!("retrieved: {}", retrieved.title);
            for file in &retrieved.files {
                println!("  {} ({} bytes, {:?})", file.path.display(), file.size_bytes, file.kind);
            }
            println!("files are staged; release them once consumed");
        }
        Resolution::Candidates(candidates) => {
            println!("matching tracks:");
            for candidate in &candidates {
                println!(
                    "  [{}] {} - {} ({}s)",
                    candidate.id, candidate.artist, candidate.title, candidate.duration_secs
                );
            }
            if let Some(first) = candidates.first() {
                println!("resolving first match...");
                let retrieved = resolver.resolve_track(first.id).await?;
                for file in &retrieved.files {
                    println!("  {} ({} bytes)", file.path.display(), file.size_bytes);
                }
            }
        }
    }

    Ok(())
}
