//! JSON Patch (RFC 6902) and JSON Merge Patch (RFC 7396)
//!
//! Both engines work on a private clone; the input document is never modified and a
//! failed patch leaves nothing half-applied.

mod format;
mod operation;

pub use format::{PatchFormat, JSON_PATCH_CONTENT_TYPE, MERGE_PATCH_CONTENT_TYPE};
pub use operation::{from_slice, parse_document, PatchOp, PatchOperation};

use json_patch::PatchErrorKind;
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// Apply JSON Patch operations in order, all or nothing.
pub fn apply_json_patch(document: &JsonValue, operations: &[PatchOperation]) -> Result<JsonValue> {
    for operation in operations {
        operation.validate()?;
    }

    let encoded = serde_json::to_value(operations)
        .map_err(|e| Error::Internal(format!("Failed to encode patch operations: {}", e)))?;
    let patch: json_patch::Patch = serde_json::from_value(encoded)
        .map_err(|e| Error::InvalidPatch(format!("Invalid JSON Patch document: {}", e)))?;

    let mut patched = document.clone();
    json_patch::patch(&mut patched, &patch.0).map_err(|e| {
        let index = e.operation;
        let path = e.path.to_string();
        tracing::debug!(index, path = %path, error = %e, "JSON Patch failed");
        match e.kind {
            PatchErrorKind::TestFailed => Error::PatchTestFailed { index, path },
            _ => Error::PatchPathNotFound { index, path },
        }
    })?;
    Ok(patched)
}

/// Merge `patch` into a copy of `document`.
///
/// `null` members remove keys, arrays and scalars replace wholesale, and a non-object
/// `patch` replaces the whole document.
pub fn apply_merge_patch(document: &JsonValue, patch: &JsonValue) -> JsonValue {
    let mut merged = document.clone();
    json_patch::merge(&mut merged, patch);
    merged
}

/// A parsed PATCH request body.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchDocument {
    Json(Vec<PatchOperation>),
    Merge(JsonValue),
}

impl PatchDocument {
    pub fn parse(format: PatchFormat, body: &[u8]) -> Result<Self> {
        match format {
            PatchFormat::JsonPatch => Ok(PatchDocument::Json(from_slice(body)?)),
            PatchFormat::MergePatch => serde_json::from_slice(body)
                .map(PatchDocument::Merge)
                .map_err(|e| {
                    Error::InvalidPatch(format!("Invalid JSON Merge Patch document: {}", e))
                }),
        }
    }

    /// Parse a body using its `Content-Type` header value.
    pub fn from_request(content_type: &str, body: &[u8]) -> Result<Self> {
        Self::parse(PatchFormat::from_content_type(content_type)?, body)
    }

    pub fn format(&self) -> PatchFormat {
        match self {
            PatchDocument::Json(_) => PatchFormat::JsonPatch,
            PatchDocument::Merge(_) => PatchFormat::MergePatch,
        }
    }

    pub fn apply(&self, document: &JsonValue) -> Result<JsonValue> {
        match self {
            PatchDocument::Json(operations) => apply_json_patch(document, operations),
            PatchDocument::Merge(patch) => Ok(apply_merge_patch(document, patch)),
        }
    }
}

/// Patch a stored resource body.
///
/// The result must still be a JSON object; `resourceType` and `id` are restored so a
/// patch cannot move the resource to another identity.
pub fn patch_resource(
    resource_type: &str,
    id: &str,
    current: &JsonValue,
    document: &PatchDocument,
) -> Result<JsonValue> {
    let mut patched = document.apply(current)?;

    let obj = patched.as_object_mut().ok_or_else(|| {
        Error::InvalidPatch("Patched resource must be a JSON object".to_string())
    })?;
    obj.insert(
        "resourceType".to_string(),
        JsonValue::String(resource_type.to_string()),
    );
    obj.insert("id".to_string(), JsonValue::String(id.to_string()));

    tracing::debug!(
        resource_type,
        id,
        format = document.format().content_type(),
        "Applied patch"
    );
    Ok(patched)
}
