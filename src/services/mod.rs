//! Services orchestrating playlist processing: retrieval, channel metadata
//! enrichment and the per-playlist pipeline run.

pub mod curator;
pub mod enrichment;
pub mod fetch;

pub use curator::Curator;
pub use enrichment::{EnrichmentOptions, EnrichmentService};
pub use fetch::{HttpFetcher, PlaylistFetcher};
