//! Domain models for versioned resources

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Identity of one versioned resource, e.g. `SurgicalCase/42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub resource_type: String,
    pub id: String,
}

impl ResourceKey {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// Mutation that produced a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionAction {
    Create,
    Update,
    Delete,
}

impl VersionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionAction::Create => "create",
            VersionAction::Update => "update",
            VersionAction::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(VersionAction::Create),
            "update" => Some(VersionAction::Update),
            "delete" => Some(VersionAction::Delete),
            _ => None,
        }
    }

    /// HTTP method of the matching `Bundle.entry.request` in a history bundle.
    pub fn http_method(&self) -> &'static str {
        match self {
            VersionAction::Create => "POST",
            VersionAction::Update => "PUT",
            VersionAction::Delete => "DELETE",
        }
    }
}

/// One immutable entry of a resource's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub resource_type: String,
    pub resource_id: String,

    /// Version ID (starts at 1, increments by 1 per mutation)
    pub version_id: i32,

    pub action: VersionAction,

    /// Resource body at this version. For deletes this is the last live body.
    pub snapshot: JsonValue,

    pub timestamp: DateTime<Utc>,
}

impl VersionRecord {
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.resource_type, &self.resource_id)
    }

    pub fn is_delete(&self) -> bool {
        self.action == VersionAction::Delete
    }
}

/// Latest version of a resource as seen by the history store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionHead {
    pub version_id: i32,
    pub action: VersionAction,
}

impl VersionHead {
    pub fn is_deleted(&self) -> bool {
        self.action == VersionAction::Delete
    }
}

/// One page of history, oldest first.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub records: Vec<VersionRecord>,
    /// Total number of versions of the resource, independent of paging
    pub total: i64,
}
