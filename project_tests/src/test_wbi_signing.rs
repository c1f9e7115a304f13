//! # WBI Signing Live Test
//!
//! Fetches live WBI keys, signs a space-feed request and sends it through the
//! proxy client, printing what bilibili answered.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use lib_common::bilibili::{BilibiliClient, BilibiliOptions, CacheStatus, Credentials, sign};
use lib_common::cache::ResponseCache;
use lib_common::retrieve::HttpFetcher;

#[derive(Parser, Debug)]
#[clap(about = "Live WBI key fetch and signed dynamic-feed request")]
struct Args {
    /// Bilibili user id whose space feed is requested.
    #[clap(long, default_value = "2")]
    uid: String,

    /// Optional SESSDATA cookie.
    #[clap(long, env = "BILIBILI_SESSDATA")]
    sessdata: Option<String>,

    /// Optional full Cookie header.
    #[clap(long, env = "BILIBILI_COOKIE")]
    cookie: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let http = HttpFetcher::new(Duration::from_secs(30))?;
    let mut options = BilibiliOptions::new(
        http,
        Arc::new(ResponseCache::new("api", Duration::from_secs(600), 16)),
        Arc::new(ResponseCache::new("image", Duration::from_secs(600), 16)),
    );
    options.credentials = Credentials {
        sessdata: args.sessdata,
        cookie: args.cookie,
    };
    let client = BilibiliClient::new(options);

    // // Statement: Collect anonymous cookies first, as the server does at startup
    client.warm_up().await;

    println!("[*] Fetching WBI keys...");
    let keys = client.keys().keys().await?;
    println!("[INFO] img_key={} sub_key={} mixin_key={}", keys.img_key, keys.sub_key, keys.mixin_key);

    let signed = sign(&BilibiliClient::dynamic_params(&args.uid), &keys.mixin_key);
    println!("[INFO] Signed query: {}", signed);

    println!("[*] Requesting space feed for uid {}...", args.uid);
    let first = client.dynamic_feed(&args.uid).await?;
    let body: serde_json::Value = serde_json::from_slice(&first.body)?;
    println!("[INFO] HTTP {} code={} message={}", first.status, body["code"], body["message"]);

    if body["code"] == 0 {
        // // Statement: code 0 responses are cached, so the repeat must be a hit
        let second = client.dynamic_feed(&args.uid).await?;
        assert_eq!(second.cache, CacheStatus::Hit);
        println!("[SUCCESS] Signed request accepted and cached");
    } else {
        eprintln!("[WARN] Upstream rejected the request (risk control or missing cookies)");
        std::process::exit(1);
    }

    Ok(())
}
