//! Stream probing: the external probe invoker and the process-wide
//! resolution cache that deduplicates concurrent probes per remote id.

pub mod cache;
pub mod prober;

pub use cache::ProbeCache;
pub use prober::{FfprobeProber, StreamProber};
