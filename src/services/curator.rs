//! Per-playlist orchestration: retrieve, parse, enrich, run the pipeline
//! passes in their fixed order, emit the configured outputs.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{Config, PlaylistConfig};
use crate::playlist::Media;
use crate::probe::{ProbeCache, StreamProber};
use crate::repositories::ChannelStore;
use crate::services::{EnrichmentOptions, EnrichmentService, PlaylistFetcher};

pub struct Curator {
    config: Arc<Config>,
    store: Arc<dyn ChannelStore>,
    prober: Arc<dyn StreamProber>,
    fetcher: Arc<dyn PlaylistFetcher>,
    cache: Arc<ProbeCache>,
    options: EnrichmentOptions,
}

impl Curator {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn ChannelStore>,
        prober: Arc<dyn StreamProber>,
        fetcher: Arc<dyn PlaylistFetcher>,
        cache: Arc<ProbeCache>,
        options: EnrichmentOptions,
    ) -> Self {
        Self {
            config,
            store,
            prober,
            fetcher,
            cache,
            options,
        }
    }

    /// Process one configured playlist end to end. A parse failure discards
    /// the whole playlist; other playlists are unaffected.
    pub async fn process_playlist(&self, list: &PlaylistConfig) -> Result<()> {
        info!("processing playlist {}", list.url);

        let body = self
            .fetcher
            .fetch(&list.url)
            .await
            .with_context(|| format!("failed to load playlist {}", list.url))?;
        let mut media =
            Media::parse(&body).with_context(|| format!("failed to parse playlist {}", list.url))?;

        let enrichment = EnrichmentService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.prober),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.cache),
            self.options.clone(),
        );
        let mut pending = enrichment.enrich(&mut media).await;

        // Fixed pass order; reordering changes the output.
        media.apply_groups_forcing(&self.config.groups);
        media.sort_groups(&self.config.groups);
        media.validate_high_res(&self.config.hd_split);
        media.order_groups(&self.config.group_order);

        media.write_files(
            &list.outputs,
            list.epg_url.as_deref(),
            self.config.censored_marker.as_deref(),
        );

        // Barrier for the fire-and-forget persistence calls issued during
        // enrichment; without it records could be lost at process exit.
        while pending.join_next().await.is_some() {}

        info!(
            "finished playlist {} ({} groups)",
            list.url,
            media.groups.len()
        );
        Ok(())
    }
}
