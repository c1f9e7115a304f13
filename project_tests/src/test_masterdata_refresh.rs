//! # Master Data Live Refresh Test
//!
//! Runs one full refresh against the real feed endpoints and prints the
//! resulting generation stats plus a few sample lookups.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use lib_common::masterdata::{FeedCatalog, FeedFetcher, FeedSource, GachaListQuery, MasterStore, FEED_TIMEOUT, list_gachas};
use lib_common::retrieve::HttpFetcher;

#[derive(Parser, Debug)]
#[clap(about = "Live master-data refresh smoke test")]
struct Args {
    /// Local snapshot directory. Defaults to an empty temp dir so every feed is fetched remotely.
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// Card id to look up in the card → event map.
    #[clap(long, default_value_t = 1)]
    card_id: i64,

    /// Point one feed at another URL, as `name=url`. Repeatable.
    #[clap(long = "feed-url")]
    feed_urls: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // // Statement: Keep the temp dir alive until the end of main
    let temp = tempfile::tempdir()?;
    let data_dir = args.data_dir.unwrap_or_else(|| temp.path().to_path_buf());

    let mut catalog = FeedCatalog::default();
    for entry in &args.feed_urls {
        let Some((name, url)) = entry.split_once('=') else {
            anyhow::bail!("--feed-url expects name=url, got {entry}");
        };
        if !catalog.override_url(name, url) {
            anyhow::bail!("unknown feed {name}");
        }
    }

    let http = HttpFetcher::new(FEED_TIMEOUT)?;
    let fetcher = FeedFetcher::new(http, &data_dir);
    let store = Arc::new(MasterStore::new(fetcher.clone(), catalog));

    // // Statement: Load each feed on its own first so a failure names its source
    println!("[*] Checking feeds...");
    for feed in store.catalog().all() {
        match fetcher.load_raw(feed).await {
            Ok((source, body)) => {
                let from = match source {
                    FeedSource::Local => "local",
                    FeedSource::Remote => "remote",
                };
                println!("    {:<15} {:>10} bytes ({from})", feed.name, body.len());
            }
            Err(e) => println!("    {:<15} FAILED{}: {e}", feed.name, if feed.critical { " (critical)" } else { "" }),
        }
    }

    println!("[*] Refreshing master data (snapshots: {})...", data_dir.display());

    match store.refresh().await {
        Ok(stats) => {
            // // Statement: Success - print the generation stats as formatted JSON
            println!("\n[SUCCESS] Generation built:");
            println!("-----------------------------------------------");
            println!("{}", serde_json::to_string_pretty(&stats)?);
            println!("-----------------------------------------------");
        }
        Err(e) => {
            eprintln!("\n[ERROR] Refresh failed:");
            eprintln!(">>> {}", e);
            std::process::exit(1);
        }
    }

    // // Statement: Sample lookups against the fresh generation
    match store.card_event_map().await.get(&args.card_id) {
        Some(event) => println!("[INFO] Card {} debuted in event {} ({})", args.card_id, event.id, event.name),
        None => println!("[INFO] Card {} has no event", args.card_id),
    }

    let generation = store.snapshot().await;
    let latest = list_gachas(
        &generation,
        &GachaListQuery {
            limit: Some("3".to_string()),
            ..Default::default()
        },
    );
    println!("[INFO] {} gachas total, latest three:", latest.total);
    for gacha in &latest.gachas {
        println!("    #{} {} (pickups: {:?})", gacha.id, gacha.name, gacha.pickup_card_ids);
    }

    // // Statement: A second refresh must bump the sequence and keep the maps identical in size
    let before = store.stats().await;
    let after = store.refresh().await?;
    assert_eq!(after.sequence, before.sequence + 1);
    assert_eq!(after.counts, before.counts);
    println!("[INFO] Second refresh OK, sequence {}", after.sequence);

    Ok(())
}
