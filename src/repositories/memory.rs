//! In-memory [`ChannelStore`] with the same observable merge semantics as
//! the relational gateway.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::models::{ChannelRecord, Provider};
use crate::repositories::ChannelStore;

#[derive(Default)]
pub struct MemoryChannelStore {
    records: Mutex<HashMap<(String, String), ChannelRecord>>,
    next_id: Mutex<i64>,
}

impl MemoryChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(remote_id: &str, provider: &Provider) -> (String, String) {
        (remote_id.to_string(), provider.host.clone())
    }
}

fn fields_differ(existing: &ChannelRecord, incoming: &ChannelRecord) -> bool {
    existing.width != incoming.width
        || existing.height != incoming.height
        || existing.frame_rate != incoming.frame_rate
        || existing.name != incoming.name
        || existing.history_days != incoming.history_days
        || existing.group_name != incoming.group_name
        || existing.tvg_name != incoming.tvg_name
}

#[async_trait]
impl ChannelStore for MemoryChannelStore {
    async fn lookup(
        &self,
        remote_id: &str,
        provider: &Provider,
    ) -> Result<Option<ChannelRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(&Self::key(remote_id, provider)).cloned())
    }

    async fn upsert(&self, mut record: ChannelRecord) -> Result<ChannelRecord> {
        let key = Self::key(&record.remote_id, &record.provider);
        let mut records = self.records.lock().await;

        match records.get(&key) {
            Some(existing) => {
                record.id = existing.id;
                record.created_at = existing.created_at;
                record.updated_at = if fields_differ(existing, &record) {
                    Utc::now()
                } else {
                    existing.updated_at
                };
            }
            None => {
                let mut next_id = self.next_id.lock().await;
                *next_id += 1;
                record.id = *next_id;
                let now = Utc::now();
                record.created_at = now;
                record.updated_at = now;
            }
        }

        records.insert(key, record.clone());
        Ok(record)
    }
}
