//! Shared vocabulary types used across the probe, playlist and persistence
//! layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stream descriptor resolved from a channel's media stream.
///
/// A descriptor counts as resolved only when both dimensions are nonzero;
/// anything else is treated as a failed probe and is never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMeta {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl StreamMeta {
    pub fn is_resolved(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Upstream source a channel was listed by, derived from the stream URL
/// host. Distinguishes otherwise-identical remote ids across sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub host: String,
}

/// Persistence-facing channel row, merged by (remote id, provider host).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: i64,
    pub remote_id: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub tvg_name: Option<String>,
    pub name: String,
    pub history_days: u32,
    pub group_name: String,
    pub provider: Provider,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChannelRecord {
    /// True when the stored stream metadata is complete enough to skip a
    /// fresh probe.
    pub fn has_stream_meta(&self) -> bool {
        self.width > 0 && self.height > 0 && self.frame_rate > 0
    }
}
