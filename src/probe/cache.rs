//! Process-wide metadata resolution cache.
//!
//! Two independent pieces of state: the result map (resolved descriptors
//! only) and the in-flight table guaranteeing at most one probe per remote
//! id process-wide. Neither lock is ever held across a probe call.
//!
//! Callers hitting an id that is already being resolved await the leader's
//! completion on a watch channel instead of polling; the wait is bounded,
//! so a hung probe stalls peers for at most the configured timeout.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::models::StreamMeta;
use crate::probe::StreamProber;

pub struct ProbeCache {
    results: DashMap<String, StreamMeta>,
    inflight: Mutex<HashMap<String, watch::Receiver<()>>>,
    wait_timeout: Duration,
}

/// Outcome of trying to start a resolution for one remote id.
enum Flight<'a> {
    /// This caller owns the probe; the guard releases the id when dropped.
    Leader(FlightGuard<'a>),
    /// Another caller is already probing; await the receiver.
    Follower(watch::Receiver<()>),
}

/// Releases the in-flight entry for an id on drop, on every exit path
/// including panic and cancellation. Dropping the held sender wakes all
/// followers.
struct FlightGuard<'a> {
    cache: &'a ProbeCache,
    id: String,
    _wake_on_drop: watch::Sender<()>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut inflight) = self.cache.inflight.lock() {
            inflight.remove(&self.id);
        }
    }
}

impl Default for ProbeCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ProbeCache {
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            results: DashMap::new(),
            inflight: Mutex::new(HashMap::new()),
            wait_timeout,
        }
    }

    /// Cached descriptor for a remote id. Never blocks, never touches the
    /// in-flight table.
    pub fn get(&self, remote_id: &str) -> Option<StreamMeta> {
        self.results.get(remote_id).map(|entry| *entry)
    }

    /// Cache a resolved descriptor. Descriptors with a zero dimension are
    /// discarded so the next request for the id probes again.
    pub fn insert(&self, remote_id: &str, meta: StreamMeta) {
        if !meta.is_resolved() {
            return;
        }
        self.results.insert(remote_id.to_string(), meta);
    }

    fn begin(&self, remote_id: &str) -> Flight<'_> {
        let mut inflight = self
            .inflight
            .lock()
            .expect("in-flight table lock poisoned");
        if let Some(receiver) = inflight.get(remote_id) {
            return Flight::Follower(receiver.clone());
        }
        let (sender, receiver) = watch::channel(());
        inflight.insert(remote_id.to_string(), receiver);
        Flight::Leader(FlightGuard {
            cache: self,
            id: remote_id.to_string(),
            _wake_on_drop: sender,
        })
    }

    /// Resolve the descriptor for a remote id, probing candidate stream
    /// URLs on a cache miss.
    ///
    /// Exactly one caller probes per id at a time; concurrent callers await
    /// the leader and re-read the cache, electing a new leader when the
    /// leader's probe came up empty. Candidates are probed from the last
    /// (most specific variant) toward the first; the first descriptor with
    /// nonzero dimensions wins and is cached. All-fail resolutions cache
    /// nothing.
    pub async fn resolve(
        &self,
        remote_id: &str,
        candidates: &[String],
        prober: &dyn StreamProber,
    ) -> Option<StreamMeta> {
        loop {
            if let Some(meta) = self.get(remote_id) {
                return Some(meta);
            }

            match self.begin(remote_id) {
                Flight::Leader(flight) => {
                    // The probe runs outside both locks.
                    let resolved = probe_candidates(remote_id, candidates, prober).await;
                    if let Some(meta) = resolved {
                        self.insert(remote_id, meta);
                    }
                    drop(flight);
                    return resolved;
                }
                Flight::Follower(mut woken) => {
                    // Either value change or sender drop wakes us; timeout
                    // bounds the damage of a hung probe.
                    match tokio::time::timeout(self.wait_timeout, woken.changed()).await {
                        Ok(_) => continue,
                        Err(_) => {
                            warn!("timed out waiting for in-flight resolution of {remote_id}");
                            return None;
                        }
                    }
                }
            }
        }
    }
}

async fn probe_candidates(
    remote_id: &str,
    candidates: &[String],
    prober: &dyn StreamProber,
) -> Option<StreamMeta> {
    for url in candidates.iter().rev() {
        match prober.probe(url).await {
            Ok(Some(meta)) if meta.is_resolved() => {
                debug!("resolved {remote_id}: {}x{}", meta.width, meta.height);
                return Some(meta);
            }
            Ok(_) => {}
            Err(err) => {
                debug!("probe of {url} for {remote_id} failed: {err}");
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedProber {
        results: HashMap<String, StreamMeta>,
        delay: Duration,
        calls: AtomicUsize,
        probed: Mutex<Vec<String>>,
    }

    impl ScriptedProber {
        fn new(results: &[(&str, StreamMeta)], delay: Duration) -> Self {
            Self {
                results: results
                    .iter()
                    .map(|(url, meta)| (url.to_string(), *meta))
                    .collect(),
                delay,
                calls: AtomicUsize::new(0),
                probed: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StreamProber for ScriptedProber {
        async fn probe(&self, url: &str) -> Result<Option<StreamMeta>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.probed.lock().unwrap().push(url.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.results.get(url).copied())
        }
    }

    fn meta(width: u32, height: u32) -> StreamMeta {
        StreamMeta {
            width,
            height,
            frame_rate: 25,
        }
    }

    fn urls(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_insert_rejects_unresolved_descriptors() {
        let cache = ProbeCache::default();
        cache.insert("1", meta(0, 1080));
        cache.insert("2", meta(1920, 0));
        assert!(cache.get("1").is_none());
        assert!(cache.get("2").is_none());

        cache.insert("3", meta(1920, 1080));
        assert_eq!(cache.get("3"), Some(meta(1920, 1080)));
    }

    #[tokio::test]
    async fn test_resolve_probes_candidates_last_to_first() {
        let cache = ProbeCache::default();
        let prober = ScriptedProber::new(&[("http://h/mid", meta(1280, 720))], Duration::ZERO);
        let candidates = urls(&["http://h/first", "http://h/mid", "http://h/last"]);

        let resolved = cache.resolve("205", &candidates, &prober).await;

        assert_eq!(resolved, Some(meta(1280, 720)));
        // Last candidate probed first, first never reached.
        assert_eq!(
            *prober.probed.lock().unwrap(),
            ["http://h/last", "http://h/mid"]
        );
        assert_eq!(cache.get("205"), Some(meta(1280, 720)));
    }

    #[tokio::test]
    async fn test_failed_resolution_is_not_cached_and_retries() {
        let cache = ProbeCache::default();
        let prober = ScriptedProber::new(&[], Duration::ZERO);
        let candidates = urls(&["http://h/only"]);

        assert!(cache.resolve("205", &candidates, &prober).await.is_none());
        assert!(cache.get("205").is_none());

        // Next request probes again instead of seeing a cached failure.
        assert!(cache.resolve("205", &candidates, &prober).await.is_none());
        assert_eq!(prober.call_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolution_probes_exactly_once() {
        let cache = Arc::new(ProbeCache::default());
        let prober = Arc::new(ScriptedProber::new(
            &[("http://h/v", meta(1920, 1080))],
            Duration::from_millis(50),
        ));
        let candidates = urls(&["http://h/v"]);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let prober = Arc::clone(&prober);
            let candidates = candidates.clone();
            tasks.push(tokio::spawn(async move {
                cache.resolve("205", &candidates, prober.as_ref()).await
            }));
        }

        for task in tasks {
            assert_eq!(task.await.unwrap(), Some(meta(1920, 1080)));
        }
        assert_eq!(prober.call_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_follower_wait_is_bounded() {
        let cache = Arc::new(ProbeCache::new(Duration::from_millis(20)));
        let prober = Arc::new(ScriptedProber::new(
            &[("http://h/v", meta(1920, 1080))],
            Duration::from_millis(200),
        ));
        let candidates = urls(&["http://h/v"]);

        let leader = {
            let cache = Arc::clone(&cache);
            let prober = Arc::clone(&prober);
            let candidates = candidates.clone();
            tokio::spawn(async move { cache.resolve("205", &candidates, prober.as_ref()).await })
        };

        // Let the leader take the in-flight slot, then give up waiting.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.resolve("205", &candidates, prober.as_ref()).await.is_none());

        // The leader itself still completes and caches.
        assert_eq!(leader.await.unwrap(), Some(meta(1920, 1080)));
        assert_eq!(cache.get("205"), Some(meta(1920, 1080)));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_probe() {
        let cache = ProbeCache::default();
        cache.insert("205", meta(1920, 1080));
        let prober = ScriptedProber::new(&[], Duration::ZERO);

        let resolved = cache.resolve("205", &urls(&["http://h/v"]), &prober).await;

        assert_eq!(resolved, Some(meta(1920, 1080)));
        assert_eq!(prober.call_count(), 0);
    }
}
