use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChannelRecord, Provider};

/// Lookup and upsert of channel records, keyed by the remote channel id and
/// the provider it was seen on.
///
/// Implementations merge upserts by the natural key (remote id, provider
/// host), assign ids, and only bump `updated_at` when a field actually
/// changed. Recording field-level change history is an implementation
/// concern.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn lookup(&self, remote_id: &str, provider: &Provider)
        -> Result<Option<ChannelRecord>>;

    async fn upsert(&self, record: ChannelRecord) -> Result<ChannelRecord>;
}
