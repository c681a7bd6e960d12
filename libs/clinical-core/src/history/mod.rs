//! Resource version tracking
//!
//! [`VersionTracker`] records create/update/delete events per resource, enforces
//! optimistic concurrency on the expected version and serves history and vread.
//! Mutations on one resource are serialized through a per-key lock; different
//! resources never contend.

mod postgres;
mod store;

pub use postgres::PostgresHistoryStore;
pub use store::{HistoryStore, InMemoryHistoryStore};

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::{
    config::HistoryConfig,
    context::RequestContext,
    models::{HistoryPage, ResourceKey, VersionAction, VersionHead, VersionRecord},
    Error, Result,
};

pub struct VersionTracker {
    store: Arc<dyn HistoryStore>,
    locks: DashMap<ResourceKey, Arc<Mutex<()>>>,
    default_count: i64,
    max_count: i64,
}

/// Removes a key's lock entry once no other caller holds or waits on it.
struct KeyLockRelease<'a> {
    locks: &'a DashMap<ResourceKey, Arc<Mutex<()>>>,
    key: &'a ResourceKey,
}

impl Drop for KeyLockRelease<'_> {
    fn drop(&mut self) {
        self.locks.remove_if(self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl std::fmt::Debug for VersionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionTracker")
            .field("locked_keys", &self.locks.len())
            .field("default_count", &self.default_count)
            .field("max_count", &self.max_count)
            .finish()
    }
}

impl VersionTracker {
    pub fn new(store: Arc<dyn HistoryStore>, config: &HistoryConfig) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            default_count: config.default_count,
            max_count: config.max_count,
        }
    }

    /// Tracker over a fresh [`InMemoryHistoryStore`] with default limits.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryHistoryStore::new()),
            &HistoryConfig::default(),
        )
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Record the creation of a resource. Returns the new version id.
    ///
    /// A resource whose latest record is a delete may be created again; its version
    /// sequence continues from the delete.
    pub async fn record_create(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
        snapshot: JsonValue,
    ) -> Result<i32> {
        ctx.ensure_active()?;
        let key = ResourceKey::new(resource_type, id);

        self.with_key_lock(ctx, &key, async {
            let version_id = match self.store.head(&key).await? {
                None => 1,
                Some(head) if head.is_deleted() => head.version_id + 1,
                Some(_) => {
                    return Err(Error::ResourceExists {
                        resource_type: resource_type.to_string(),
                        id: id.to_string(),
                    })
                }
            };

            self.append(&key, version_id, VersionAction::Create, snapshot)
                .await?;
            Ok(version_id)
        })
        .await
    }

    /// Record an update, succeeding only if `expected_version` is the current version.
    /// Returns the new version id.
    pub async fn record_update(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
        expected_version: i32,
        snapshot: JsonValue,
    ) -> Result<i32> {
        ctx.ensure_active()?;
        check_expected_version(expected_version)?;
        let key = ResourceKey::new(resource_type, id);

        self.with_key_lock(ctx, &key, async {
            let head = self.live_head(&key).await?;
            check_version_match(&key, expected_version, head.version_id)?;

            let version_id = head.version_id + 1;
            self.append(&key, version_id, VersionAction::Update, snapshot)
                .await?;
            Ok(version_id)
        })
        .await
    }

    /// Record a delete. The delete record carries the last live body.
    /// Returns the version id of the delete record.
    pub async fn record_delete(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
        expected_version: i32,
    ) -> Result<i32> {
        ctx.ensure_active()?;
        check_expected_version(expected_version)?;
        let key = ResourceKey::new(resource_type, id);

        self.with_key_lock(ctx, &key, async {
            let head = self.live_head(&key).await?;
            check_version_match(&key, expected_version, head.version_id)?;

            let last = self
                .store
                .get(&key, head.version_id)
                .await?
                .ok_or_else(|| {
                    Error::Internal(format!(
                        "History head {}/_history/{} has no record",
                        key, head.version_id
                    ))
                })?;

            let version_id = head.version_id + 1;
            self.append(&key, version_id, VersionAction::Delete, last.snapshot)
                .await?;
            Ok(version_id)
        })
        .await
    }

    /// One page of history, oldest first.
    ///
    /// `limit` defaults to the configured page size and is clamped to the configured
    /// maximum. Negative values are rejected.
    pub async fn get_history(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<HistoryPage> {
        ctx.ensure_active()?;
        let limit = limit.unwrap_or(self.default_count);
        if limit < 0 {
            return Err(Error::InvalidParameter(format!(
                "history limit must not be negative, got {}",
                limit
            )));
        }
        if offset < 0 {
            return Err(Error::InvalidParameter(format!(
                "history offset must not be negative, got {}",
                offset
            )));
        }
        let limit = limit.min(self.max_count);

        let key = ResourceKey::new(resource_type, id);
        let total = self.store.count(&key).await?;
        if total == 0 {
            return Err(not_found(&key));
        }

        let records = self.store.list(&key, limit, offset).await?;
        Ok(HistoryPage { records, total })
    }

    /// Snapshot recorded at `version_id` (vread).
    pub async fn get_at_version(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
        version_id: i32,
    ) -> Result<JsonValue> {
        ctx.ensure_active()?;
        let key = ResourceKey::new(resource_type, id);

        match self.store.get(&key, version_id).await? {
            Some(record) if record.is_delete() => Err(Error::ResourceDeleted {
                resource_type: key.resource_type,
                id: key.id,
                version_id,
            }),
            Some(record) => Ok(record.snapshot),
            None => {
                if self.store.head(&key).await?.is_none() {
                    return Err(not_found(&key));
                }
                Err(Error::VersionNotFound {
                    resource_type: key.resource_type,
                    id: key.id,
                    version_id,
                })
            }
        }
    }

    /// Latest version of a resource, including whether it is deleted.
    pub async fn current_version(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
    ) -> Result<VersionHead> {
        ctx.ensure_active()?;
        let key = ResourceKey::new(resource_type, id);
        self.store
            .head(&key)
            .await?
            .ok_or_else(|| not_found(&key))
    }

    /// Run `op` while holding the lock for `key`. The context is checked again once the
    /// lock is held, since waiting for it may outlast the deadline.
    async fn with_key_lock<F, T>(
        &self,
        ctx: &RequestContext,
        key: &ResourceKey,
        op: F,
    ) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        // Declared before `lock` so it runs after the clone is released, including
        // when this future is dropped mid-wait.
        let _release = KeyLockRelease {
            locks: &self.locks,
            key,
        };
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let _guard = lock.lock().await;
        ctx.ensure_active()?;
        op.await
    }

    async fn live_head(&self, key: &ResourceKey) -> Result<VersionHead> {
        match self.store.head(key).await? {
            None => Err(not_found(key)),
            Some(head) if head.is_deleted() => Err(Error::ResourceDeleted {
                resource_type: key.resource_type.clone(),
                id: key.id.clone(),
                version_id: head.version_id,
            }),
            Some(head) => Ok(head),
        }
    }

    async fn append(
        &self,
        key: &ResourceKey,
        version_id: i32,
        action: VersionAction,
        snapshot: JsonValue,
    ) -> Result<()> {
        let record = VersionRecord {
            resource_type: key.resource_type.clone(),
            resource_id: key.id.clone(),
            version_id,
            action,
            snapshot,
            timestamp: Utc::now(),
        };
        self.store.append(record).await?;

        tracing::info!(
            resource = %key,
            version_id,
            action = action.as_str(),
            "Recorded resource version"
        );
        Ok(())
    }
}

fn check_expected_version(expected: i32) -> Result<()> {
    if expected < 1 {
        return Err(Error::InvalidParameter(format!(
            "expected version must be at least 1, got {}",
            expected
        )));
    }
    Ok(())
}

fn check_version_match(key: &ResourceKey, expected: i32, actual: i32) -> Result<()> {
    if expected != actual {
        tracing::warn!(
            resource = %key,
            expected,
            actual,
            "Version conflict"
        );
        return Err(Error::VersionConflict { expected, actual });
    }
    Ok(())
}

fn not_found(key: &ResourceKey) -> Error {
    Error::ResourceNotFound {
        resource_type: key.resource_type.clone(),
        id: key.id.clone(),
    }
}
