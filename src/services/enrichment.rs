//! Channel metadata enrichment.
//!
//! For every channel with a usable remote identity: consult the persistence
//! gateway, probe the stream when the stored metadata is missing or stale,
//! and push changed records back. Probes go through the shared
//! [`ProbeCache`], persistence writes are fire-and-forget tasks drained by
//! the caller before the playlist run finishes.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::StreamExt;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::models::{ChannelRecord, StreamMeta};
use crate::playlist::{Channel, Media, RemoteIdentity};
use crate::probe::{ProbeCache, StreamProber};
use crate::repositories::ChannelStore;
use crate::services::PlaylistFetcher;

#[derive(Debug, Clone)]
pub struct EnrichmentOptions {
    /// Concurrent channel enrichments within one playlist task.
    pub concurrency: usize,
    /// Re-probe every channel even when the store already has metadata.
    pub force_reload: bool,
    /// Never probe when the store has a record for the channel, even an
    /// incomplete one.
    pub no_probe: bool,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            force_reload: false,
            no_probe: false,
        }
    }
}

pub struct EnrichmentService {
    store: Arc<dyn ChannelStore>,
    prober: Arc<dyn StreamProber>,
    fetcher: Arc<dyn PlaylistFetcher>,
    cache: Arc<ProbeCache>,
    options: EnrichmentOptions,
}

impl EnrichmentService {
    pub fn new(
        store: Arc<dyn ChannelStore>,
        prober: Arc<dyn StreamProber>,
        fetcher: Arc<dyn PlaylistFetcher>,
        cache: Arc<ProbeCache>,
        options: EnrichmentOptions,
    ) -> Self {
        Self {
            store,
            prober,
            fetcher,
            cache,
            options,
        }
    }

    /// Enrich every channel of the media, bounded-concurrently. Returns the
    /// set of still-outstanding persistence tasks; the caller drains it
    /// before declaring the playlist done.
    pub async fn enrich(&self, media: &mut Media) -> JoinSet<()> {
        let mut work = Vec::new();
        for group in &mut media.groups {
            let group_name = group.name.clone();
            for channel in &mut group.channels {
                work.push((group_name.clone(), channel));
            }
        }

        let pending = Mutex::new(JoinSet::new());
        futures::stream::iter(work)
            .for_each_concurrent(self.options.concurrency, |(group_name, channel)| {
                let pending = &pending;
                async move {
                    self.enrich_channel(&group_name, channel, pending).await;
                }
            })
            .await;

        pending
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn enrich_channel(
        &self,
        group_name: &str,
        channel: &mut Channel,
        pending: &Mutex<JoinSet<()>>,
    ) {
        // Channels with a malformed URL were already logged at construction.
        let Some(identity) = channel.identity.clone() else {
            return;
        };

        let existing = match self
            .store
            .lookup(&identity.remote_id, &identity.provider)
            .await
        {
            Ok(existing) => existing,
            Err(err) => {
                warn!("lookup failed for remote id {}: {err}", identity.remote_id);
                None
            }
        };

        let probe_needed = match &existing {
            None => true,
            Some(record) => {
                (!self.options.no_probe && !record.has_stream_meta()) || self.options.force_reload
            }
        };

        if probe_needed {
            match self.load_meta(&identity.remote_id, &channel.url).await {
                Some(meta) => channel.apply_meta(meta),
                None => debug!(
                    "failed to load stream meta for remote id {}",
                    identity.remote_id
                ),
            }
        } else if let Some(record) = &existing {
            channel.apply_meta(StreamMeta {
                width: record.width,
                height: record.height,
                frame_rate: record.frame_rate,
            });
            channel.tvg_name = record.tvg_name.clone();
        }

        if needs_store_update(existing.as_ref(), channel, group_name) {
            let record = build_record(channel, &identity, group_name);
            let store = Arc::clone(&self.store);
            if let Ok(mut pending) = pending.lock() {
                pending.spawn(async move {
                    if let Err(err) = store.upsert(record).await {
                        warn!("channel upsert failed: {err}");
                    }
                });
            }
        }
    }

    /// Resolve stream metadata for one channel. The channel URL points at a
    /// variant playlist; its entries are the candidate stream URLs.
    async fn load_meta(&self, remote_id: &str, url: &str) -> Option<StreamMeta> {
        if let Some(meta) = self.cache.get(remote_id) {
            return Some(meta);
        }

        let body = match self.fetcher.fetch(url).await {
            Ok(body) => body,
            Err(err) => {
                debug!("failed to fetch variant playlist {url}: {err}");
                return None;
            }
        };
        let variant = match Media::parse(&body) {
            Ok(variant) => variant,
            Err(err) => {
                debug!("failed to parse variant playlist {url}: {err}");
                return None;
            }
        };
        let candidates: Vec<String> = variant
            .records
            .iter()
            .filter(|record| !record.url.is_empty())
            .map(|record| record.url.clone())
            .collect();
        if candidates.is_empty() {
            return None;
        }

        self.cache
            .resolve(remote_id, &candidates, self.prober.as_ref())
            .await
    }
}

fn needs_store_update(
    existing: Option<&ChannelRecord>,
    channel: &Channel,
    group_name: &str,
) -> bool {
    let Some(record) = existing else {
        return true;
    };
    if record.id == 0 {
        return true;
    }
    if record.width != channel.width && channel.width != 0 {
        return true;
    }
    if record.height != channel.height && channel.height != 0 {
        return true;
    }
    if record.frame_rate != channel.frame_rate && channel.frame_rate != 0 {
        return true;
    }
    if record.name != channel.name {
        return true;
    }
    if record.history_days != channel.history_days {
        return true;
    }
    record.group_name != group_name
}

fn build_record(channel: &Channel, identity: &RemoteIdentity, group_name: &str) -> ChannelRecord {
    let now = Utc::now();
    ChannelRecord {
        id: 0,
        remote_id: identity.remote_id.clone(),
        width: channel.width,
        height: channel.height,
        frame_rate: channel.frame_rate,
        tvg_name: channel.tvg_name.clone(),
        name: channel.name.clone(),
        history_days: channel.history_days,
        group_name: group_name.to_string(),
        provider: identity.provider.clone(),
        created_at: now,
        updated_at: now,
    }
}
