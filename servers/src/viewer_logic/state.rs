use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use lib_common::bilibili::{BilibiliClient, BilibiliOptions, Credentials};
use lib_common::cache::ResponseCache;
use lib_common::masterdata::{FeedCatalog, FeedFetcher, MasterStore, FEED_TIMEOUT};
use lib_common::retrieve::HttpFetcher;

use super::config::Settings;

/// Everything the handlers share. Built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MasterStore>,
    pub bilibili: Arc<BilibiliClient>,
    /// `None` when the frontend build directory does not exist.
    pub static_dir: Option<Arc<PathBuf>>,
}

impl AppState {
    pub fn new(store: Arc<MasterStore>, bilibili: Arc<BilibiliClient>, static_dir: Option<PathBuf>) -> Self {
        Self {
            store,
            bilibili,
            static_dir: static_dir.map(Arc::new),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = HttpFetcher::new(FEED_TIMEOUT)?;

        let fetcher = FeedFetcher::new(http.clone(), settings.master_data_dir.clone());
        let store = Arc::new(MasterStore::new(fetcher, FeedCatalog::default()));

        let api_cache = Arc::new(ResponseCache::new("bilibili_api", settings.api_cache_ttl, settings.cache_capacity));
        let image_cache = Arc::new(ResponseCache::new("bilibili_image", settings.image_cache_ttl, settings.cache_capacity));
        let mut options = BilibiliOptions::new(http, api_cache, image_cache);
        options.key_validity = settings.wbi_key_ttl;
        options.credentials = Credentials {
            sessdata: settings.bilibili_sessdata.clone(),
            cookie: settings.bilibili_cookie.clone(),
        };
        let bilibili = Arc::new(BilibiliClient::new(options));

        let static_dir = settings.static_dir.is_dir().then(|| settings.static_dir.clone());
        Ok(Self::new(store, bilibili, static_dir))
    }
}
