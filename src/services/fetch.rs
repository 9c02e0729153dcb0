//! Playlist retrieval over HTTP.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// Retrieval of playlist text by URL. Both top-level provider playlists and
/// per-channel variant playlists come through here.
#[async_trait]
pub trait PlaylistFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PlaylistFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("fetching playlist: {url}");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}
