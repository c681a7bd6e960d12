//! Append-only history storage

use async_trait::async_trait;
use dashmap::DashMap;

use crate::{
    models::{ResourceKey, VersionHead, VersionRecord},
    Error, Result,
};

/// Storage backend for version history.
///
/// Records are only ever appended; nothing updates or removes one. Implementations must
/// reject an append whose version is not exactly one past the stored head with
/// `VersionConflict`, so a store shared between processes also linearizes writers.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Latest version of a resource, or `None` if it has no history.
    async fn head(&self, key: &ResourceKey) -> Result<Option<VersionHead>>;

    /// Append a record as the new head.
    async fn append(&self, record: VersionRecord) -> Result<()>;

    /// Records oldest first, skipping `offset` and returning at most `limit`.
    async fn list(&self, key: &ResourceKey, limit: i64, offset: i64)
        -> Result<Vec<VersionRecord>>;

    /// A single version.
    async fn get(&self, key: &ResourceKey, version_id: i32) -> Result<Option<VersionRecord>>;

    /// Number of versions recorded for a resource.
    async fn count(&self, key: &ResourceKey) -> Result<i64>;
}

/// Process-local history store, used in tests and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    logs: DashMap<ResourceKey, Vec<VersionRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resources with at least one recorded version.
    pub fn resource_count(&self) -> usize {
        self.logs.len()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn head(&self, key: &ResourceKey) -> Result<Option<VersionHead>> {
        Ok(self.logs.get(key).and_then(|log| {
            log.last().map(|r| VersionHead {
                version_id: r.version_id,
                action: r.action,
            })
        }))
    }

    async fn append(&self, record: VersionRecord) -> Result<()> {
        let mut log = self.logs.entry(record.key()).or_default();
        let current = log.last().map(|r| r.version_id).unwrap_or(0);
        if record.version_id != current + 1 {
            return Err(Error::VersionConflict {
                expected: record.version_id - 1,
                actual: current,
            });
        }
        log.push(record);
        Ok(())
    }

    async fn list(
        &self,
        key: &ResourceKey,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<VersionRecord>> {
        let Some(log) = self.logs.get(key) else {
            return Ok(Vec::new());
        };
        Ok(log
            .iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get(&self, key: &ResourceKey, version_id: i32) -> Result<Option<VersionRecord>> {
        if version_id < 1 {
            return Ok(None);
        }
        Ok(self
            .logs
            .get(key)
            .and_then(|log| log.get((version_id - 1) as usize).cloned()))
    }

    async fn count(&self, key: &ResourceKey) -> Result<i64> {
        Ok(self.logs.get(key).map(|log| log.len() as i64).unwrap_or(0))
    }
}
