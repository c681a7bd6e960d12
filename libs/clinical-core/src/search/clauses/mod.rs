//! Search clause builders organized by parameter type.
//!
//! Each builder returns `Ok(None)` when the occurrence yields no usable value.

mod boolean;
mod date;
mod reference;
mod string;
mod token;

use super::{BindValue, ParamType, ResolvedParam, SearchModifier};
use crate::{Error, Result};

pub(in crate::search) fn build_param_clause(
    resolved: &ResolvedParam<'_>,
    bind_params: &mut Vec<BindValue>,
) -> Result<Option<String>> {
    if resolved.modifier == Some(SearchModifier::Missing) {
        return build_missing_clause(resolved);
    }

    match resolved.descriptor.param_type {
        ParamType::Token => token::build_token_clause(resolved, bind_params),
        ParamType::Reference => reference::build_reference_clause(resolved, bind_params),
        ParamType::String => Ok(string::build_string_clause(resolved, bind_params)),
        ParamType::Date => date::build_date_clause(resolved, bind_params),
        ParamType::Boolean => boolean::build_boolean_clause(resolved, bind_params),
    }
}

/// `:missing=true` matches rows without a value, `:missing=false` rows with one.
fn build_missing_clause(resolved: &ResolvedParam<'_>) -> Result<Option<String>> {
    let column = &resolved.descriptor.column;
    let mut parts = Vec::new();
    for v in &resolved.values {
        let missing = boolean::parse_bool(&resolved.descriptor.name, &v.raw)?;
        parts.push(if missing {
            format!("{} IS NULL", column)
        } else {
            format!("{} IS NOT NULL", column)
        });
    }
    Ok(join_or(parts))
}

pub(super) fn join_or(mut parts: Vec<String>) -> Option<String> {
    if parts.is_empty() {
        None
    } else if parts.len() == 1 {
        Some(parts.remove(0))
    } else {
        Some(format!("({})", parts.join(" OR ")))
    }
}

pub(super) fn invalid_value(resolved: &ResolvedParam<'_>, raw: &str, expected: &str) -> Error {
    Error::InvalidParameter(format!(
        "invalid value '{}' for {} parameter '{}': expected {}",
        raw,
        resolved.descriptor.param_type.as_str(),
        resolved.descriptor.name,
        expected
    ))
}
