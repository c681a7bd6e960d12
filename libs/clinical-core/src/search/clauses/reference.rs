use crate::search::escape::unescape_or_raw;
use crate::Result;

use super::super::bind::push_text;
use super::super::{BindValue, ResolvedParam};
use super::{invalid_value, join_or};

/// Reference columns hold the bare id of the target.
///
/// Accepts `id` or a relative `Type/id`.
pub(super) fn build_reference_clause(
    resolved: &ResolvedParam<'_>,
    bind_params: &mut Vec<BindValue>,
) -> Result<Option<String>> {
    let column = &resolved.descriptor.column;
    let mut parts = Vec::new();
    for v in &resolved.values {
        let raw = unescape_or_raw(&v.raw);
        let id = parse_reference_id(&raw)
            .ok_or_else(|| invalid_value(resolved, &v.raw, "an id or Type/id"))?;
        let idx = push_text(bind_params, id.to_string());
        parts.push(format!("{} = ${}", column, idx));
    }
    Ok(join_or(parts))
}

fn parse_reference_id(raw: &str) -> Option<&str> {
    let segments: Vec<&str> = raw.split('/').collect();
    match segments.as_slice() {
        [id] if !id.is_empty() => Some(*id),
        [typ, id] if is_resource_type(typ) && !id.is_empty() => Some(*id),
        _ => None,
    }
}

fn is_resource_type(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric())
}
