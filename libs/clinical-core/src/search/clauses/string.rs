use crate::search::escape::{escape_like_pattern, unescape_or_raw};

use super::super::bind::push_text;
use super::super::{BindValue, ResolvedParam, SearchModifier};
use super::join_or;

pub(super) fn build_string_clause(
    resolved: &ResolvedParam<'_>,
    bind_params: &mut Vec<BindValue>,
) -> Option<String> {
    let column = &resolved.descriptor.column;
    match resolved.modifier {
        Some(SearchModifier::Exact) => {
            let mut parts = Vec::new();
            for v in &resolved.values {
                let value = unescape_or_raw(&v.raw);
                if value.is_empty() {
                    continue;
                }
                let idx = push_text(bind_params, value);
                parts.push(format!("{} = ${}", column, idx));
            }
            join_or(parts)
        }

        // Default and :contains are both case-insensitive substring matches
        _ => {
            let mut parts = Vec::new();
            for v in &resolved.values {
                let value = unescape_or_raw(&v.raw);
                if value.trim().is_empty() {
                    continue;
                }
                let idx = push_text(bind_params, format!("%{}%", escape_like_pattern(&value)));
                parts.push(format!("{} ILIKE ${} ESCAPE E'\\\\'", column, idx));
            }
            join_or(parts)
        }
    }
}
