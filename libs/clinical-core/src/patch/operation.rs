//! RFC 6902 operation model and request-body parsing

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

impl PatchOp {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "add" => Ok(PatchOp::Add),
            "remove" => Ok(PatchOp::Remove),
            "replace" => Ok(PatchOp::Replace),
            "move" => Ok(PatchOp::Move),
            "copy" => Ok(PatchOp::Copy),
            "test" => Ok(PatchOp::Test),
            other => Err(Error::UnsupportedOperation(format!(
                "'{}' is not a JSON Patch operation",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOp::Add => "add",
            PatchOp::Remove => "remove",
            PatchOp::Replace => "replace",
            PatchOp::Move => "move",
            PatchOp::Copy => "copy",
            PatchOp::Test => "test",
        }
    }

    fn requires_value(&self) -> bool {
        matches!(self, PatchOp::Add | PatchOp::Replace | PatchOp::Test)
    }

    fn requires_from(&self) -> bool {
        matches!(self, PatchOp::Move | PatchOp::Copy)
    }
}

/// One JSON Patch operation.
///
/// `value` is `Some(Value::Null)` when the document supplies an explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: JsonValue) -> Self {
        Self::with_value(PatchOp::Add, path, value)
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
            from: None,
        }
    }

    pub fn replace(path: impl Into<String>, value: JsonValue) -> Self {
        Self::with_value(PatchOp::Replace, path, value)
    }

    pub fn move_from(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_from(PatchOp::Move, from, path)
    }

    pub fn copy_from(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_from(PatchOp::Copy, from, path)
    }

    pub fn test(path: impl Into<String>, value: JsonValue) -> Self {
        Self::with_value(PatchOp::Test, path, value)
    }

    fn with_value(op: PatchOp, path: impl Into<String>, value: JsonValue) -> Self {
        Self {
            op,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }

    fn with_from(op: PatchOp, from: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            op,
            path: path.into(),
            value: None,
            from: Some(from.into()),
        }
    }

    /// Check that the members required by `op` are present and that pointers are
    /// well formed.
    pub fn validate(&self) -> Result<()> {
        check_pointer(&self.path)?;
        if self.op.requires_value() && self.value.is_none() {
            return Err(Error::InvalidPatch(format!(
                "'{}' operation at '{}' requires a 'value'",
                self.op.as_str(),
                self.path
            )));
        }
        if self.op.requires_from() {
            match &self.from {
                Some(from) => check_pointer(from)?,
                None => {
                    return Err(Error::InvalidPatch(format!(
                        "'{}' operation at '{}' requires a 'from'",
                        self.op.as_str(),
                        self.path
                    )))
                }
            }
        }
        Ok(())
    }
}

/// The empty pointer addresses the whole document; anything else starts with `/`.
fn check_pointer(pointer: &str) -> Result<()> {
    if !pointer.is_empty() && !pointer.starts_with('/') {
        return Err(Error::InvalidPatch(format!(
            "'{}' is not a JSON pointer",
            pointer
        )));
    }
    Ok(())
}

/// Parse a JSON Patch request body.
pub fn from_slice(body: &[u8]) -> Result<Vec<PatchOperation>> {
    let document: JsonValue = serde_json::from_slice(body)
        .map_err(|e| Error::InvalidPatch(format!("Invalid JSON Patch document: {}", e)))?;
    parse_document(&document)
}

/// Parse an already-decoded JSON Patch document.
pub fn parse_document(document: &JsonValue) -> Result<Vec<PatchOperation>> {
    let entries = document.as_array().ok_or_else(|| {
        Error::InvalidPatch("JSON Patch document must be an array of operations".to_string())
    })?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_operation(index, entry))
        .collect()
}

fn parse_operation(index: usize, entry: &JsonValue) -> Result<PatchOperation> {
    let obj = entry.as_object().ok_or_else(|| {
        Error::InvalidPatch(format!("operation {} must be a JSON object", index))
    })?;

    let op = match obj.get("op") {
        Some(JsonValue::String(op)) => PatchOp::parse(op)?,
        Some(_) => {
            return Err(Error::InvalidPatch(format!(
                "operation {}: 'op' must be a string",
                index
            )))
        }
        None => {
            return Err(Error::InvalidPatch(format!(
                "operation {} is missing 'op'",
                index
            )))
        }
    };

    let path = string_member(index, obj, "path")?.ok_or_else(|| {
        Error::InvalidPatch(format!("operation {} is missing 'path'", index))
    })?;
    let from = string_member(index, obj, "from")?;

    let operation = PatchOperation {
        op,
        path,
        value: obj.get("value").cloned(),
        from,
    };
    operation.validate()?;
    Ok(operation)
}

fn string_member(
    index: usize,
    obj: &serde_json::Map<String, JsonValue>,
    name: &str,
) -> Result<Option<String>> {
    match obj.get(name) {
        None => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::InvalidPatch(format!(
            "operation {}: '{}' must be a string",
            index, name
        ))),
    }
}
