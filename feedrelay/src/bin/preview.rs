//! Fetch feeds and print what the relay would send for them right now.
//!
//!     cargo run --bin preview -- --since 3600 https://hnrss.org/newest

use chrono::Utc;
use clap::Parser;
use common::FetchConfig;
use feedrelay::filter::{filter_entries, Window};
use feedrelay::formatter::format_entry;
use feedrelay::ingestion::{FeedFetcher, HttpFeedFetcher};

#[derive(Parser, Debug)]
#[command(name = "preview", about = "Preview the messages feedrelay would send for some feeds")]
struct Args {
    /// Window size in seconds; entries newer than now - since are shown
    #[arg(long, default_value_t = common::DEFAULT_POLL_INTERVAL_SECS)]
    since: u64,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Feed URLs
    #[arg(required = true)]
    urls: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let fetcher = HttpFeedFetcher::new(&FetchConfig {
        timeout_seconds: args.timeout,
        ..FetchConfig::default()
    })?;
    let threshold = Utc::now() - chrono::Duration::seconds(args.since.min(u32::MAX as u64) as i64);

    for url in &args.urls {
        println!("\n{}", "=".repeat(60));
        println!("{} (since {})", url, threshold.to_rfc3339());
        println!("{}", "=".repeat(60));

        match fetcher.fetch(url).await {
            Ok(doc) => {
                let entries = filter_entries(&doc, &Window::since(threshold));
                println!("✓ \"{}\": {} of {} entries match", doc.site_name, entries.len(), doc.entries.len());
                for (i, entry) in entries.iter().enumerate() {
                    let msg = format_entry(entry, &doc.site_name);
                    println!("  {}. {}", i + 1, msg.title);
                    println!("     URL: {}", msg.link);
                    println!("     Summary: {} chars", msg.summary.chars().count());
                }
            }
            Err(e) => {
                println!("✗ Failed: {}", e);
            }
        }
    }
    Ok(())
}
