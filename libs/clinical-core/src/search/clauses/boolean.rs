use crate::{Error, Result};

use super::super::bind::push_bind;
use super::super::{BindValue, ResolvedParam};
use super::join_or;

pub(super) fn build_boolean_clause(
    resolved: &ResolvedParam<'_>,
    bind_params: &mut Vec<BindValue>,
) -> Result<Option<String>> {
    let column = &resolved.descriptor.column;
    let mut parts = Vec::new();
    for v in &resolved.values {
        let value = parse_bool(&resolved.descriptor.name, &v.raw)?;
        let idx = push_bind(bind_params, BindValue::Boolean(value));
        parts.push(format!("{} = ${}", column, idx));
    }
    Ok(join_or(parts))
}

pub(super) fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::InvalidParameter(format!(
            "invalid value '{raw}' for parameter '{name}': expected true or false"
        ))),
    }
}
