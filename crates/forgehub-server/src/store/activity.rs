// SPDX-License-Identifier: Apache-2.0

use crate::store::{ActivityLog, StoreError};
use async_trait::async_trait;
use forgehub_model::{ActivityRecord, ProjectId, UserId};
use std::collections::VecDeque;
use tokio::sync::Mutex;

pub const DEFAULT_MAX_ACTIVITY_RECORDS: usize = 10_000;

/// Append-only feed with bounded retention: the oldest records fall off
/// once `max_records` is reached.
pub struct MemoryActivityLog {
    records: Mutex<VecDeque<ActivityRecord>>,
    max_records: usize,
}

impl MemoryActivityLog {
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            max_records: max_records.max(1),
        }
    }
}

impl Default for MemoryActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ACTIVITY_RECORDS)
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn append(&self, record: ActivityRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        records.push_back(record);
        while records.len() > self.max_records {
            records.pop_front();
        }
        Ok(())
    }

    async fn recent_for_project(
        &self,
        id: &ProjectId,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.project == *id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_for_user(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.user == *user)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn prune_project(&self, id: &ProjectId) -> Result<(), StoreError> {
        self.records.lock().await.retain(|r| r.project != *id);
        Ok(())
    }
}
