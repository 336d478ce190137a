//! Document collections shared by the in-memory and JSON file stores.
//!
//! All operations are synchronous and run under the owning store's lock, so
//! each call is atomic with respect to a single record.
//!
//! Bulk queries skip documents that fail to decode and log them; lookups by
//! id stay strict.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::document::{LogDocument, TaskDocument};
use crate::domain::{
    ExecutionLogEntry, StorageError, TaskId, TaskRecord, TaskStatus, TaskUpdate,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentCollections {
    /// Keyed by the document id string.
    #[serde(default)]
    tasks: BTreeMap<String, TaskDocument>,
    /// Append order is recording order.
    #[serde(default)]
    logs: Vec<LogDocument>,
}

impl DocumentCollections {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_all(&self) -> Vec<TaskRecord> {
        self.tasks
            .iter()
            .filter_map(|(key, doc)| match TaskRecord::try_from(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(task_id = %key, error = %e, "skipping undecodable task document");
                    None
                }
            })
            .collect()
    }

    pub fn insert(&mut self, record: &TaskRecord) -> Result<(), StorageError> {
        let key = record.id.to_string();
        if self.tasks.contains_key(&key) {
            return Err(StorageError::Duplicate(record.id));
        }
        self.tasks.insert(key, TaskDocument::from(record));
        Ok(())
    }

    pub fn find_by_id(&self, id: TaskId) -> Result<Option<TaskRecord>, StorageError> {
        self.tasks
            .get(&id.to_string())
            .map(TaskRecord::try_from)
            .transpose()
    }

    pub fn find_ready(
        &self,
        statuses: &[TaskStatus],
        before: DateTime<Utc>,
    ) -> Result<Vec<TaskRecord>, StorageError> {
        let mut ready: Vec<TaskRecord> = self
            .decode_all()
            .into_iter()
            .filter(|r| statuses.contains(&r.status))
            .filter(|r| r.scheduled_at.is_none_or(|at| at <= before))
            .collect();
        ready.sort_by_key(|r| (r.created_at, r.id));
        Ok(ready)
    }

    pub fn find_by_status(&self, statuses: &[TaskStatus]) -> Result<Vec<TaskRecord>, StorageError> {
        let mut found: Vec<TaskRecord> = self
            .decode_all()
            .into_iter()
            .filter(|r| statuses.contains(&r.status))
            .collect();
        found.sort_by_key(|r| (r.created_at, r.id));
        Ok(found)
    }

    pub fn update(&mut self, id: TaskId, update: &TaskUpdate) -> Result<bool, StorageError> {
        let Some(doc) = self.tasks.get_mut(&id.to_string()) else {
            return Ok(false);
        };
        let mut record = TaskRecord::try_from(&*doc)?;
        update.apply(&mut record);
        *doc = TaskDocument::from(&record);
        Ok(true)
    }

    pub fn transition(
        &mut self,
        id: TaskId,
        from: &[TaskStatus],
        update: &TaskUpdate,
    ) -> Result<Option<TaskRecord>, StorageError> {
        let Some(doc) = self.tasks.get_mut(&id.to_string()) else {
            return Ok(None);
        };
        let mut record = TaskRecord::try_from(&*doc)?;
        if !from.contains(&record.status) {
            return Ok(None);
        }
        update.apply(&mut record);
        *doc = TaskDocument::from(&record);
        Ok(Some(record))
    }

    pub fn delete_older_than(
        &mut self,
        statuses: &[TaskStatus],
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let expired: Vec<String> = self
            .decode_all()
            .into_iter()
            .filter(|r| statuses.contains(&r.status) && r.finished_at() < cutoff)
            .map(|r| r.id.to_string())
            .collect();
        for key in &expired {
            self.tasks.remove(key);
        }
        Ok(expired.len())
    }

    pub fn count_by_status(&self) -> Result<HashMap<TaskStatus, usize>, StorageError> {
        let mut counts = HashMap::new();
        for record in self.decode_all() {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    pub fn append_log(&mut self, entry: &ExecutionLogEntry) {
        self.logs.push(LogDocument::from(entry));
    }

    pub fn recent_logs(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>, StorageError> {
        Ok(self
            .logs
            .iter()
            .rev()
            .filter(|doc| owner.is_none() || doc.owner.as_deref() == owner)
            .filter_map(|doc| match ExecutionLogEntry::try_from(doc) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(log_id = %doc.id, error = %e, "skipping undecodable log document");
                    None
                }
            })
            .take(limit)
            .collect())
    }

    pub fn delete_logs_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let before = self.logs.len();
        // Undecodable entries are kept; only a readable timestamp can expire.
        self.logs.retain(|doc| {
            ExecutionLogEntry::try_from(doc).map_or(true, |e| e.recorded_at >= cutoff)
        });
        Ok(before - self.logs.len())
    }
}
