use crate::{Error, Result};

pub const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";
pub const MERGE_PATCH_CONTENT_TYPE: &str = "application/merge-patch+json";

/// Patch dialect selected by the request content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchFormat {
    /// RFC 6902
    JsonPatch,
    /// RFC 7396
    MergePatch,
}

impl PatchFormat {
    /// Select the format from a `Content-Type` header value. Media type parameters are
    /// ignored and matching is case insensitive.
    pub fn from_content_type(content_type: &str) -> Result<Self> {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match media_type.as_str() {
            JSON_PATCH_CONTENT_TYPE => Ok(PatchFormat::JsonPatch),
            MERGE_PATCH_CONTENT_TYPE => Ok(PatchFormat::MergePatch),
            "" => Err(Error::UnsupportedMediaType(
                "Missing Content-Type for PATCH request".to_string(),
            )),
            other => Err(Error::UnsupportedMediaType(format!(
                "Unsupported PATCH Content-Type '{}'. Supported: {}, {}",
                other, JSON_PATCH_CONTENT_TYPE, MERGE_PATCH_CONTENT_TYPE
            ))),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            PatchFormat::JsonPatch => JSON_PATCH_CONTENT_TYPE,
            PatchFormat::MergePatch => MERGE_PATCH_CONTENT_TYPE,
        }
    }
}
