use crate::search::escape::{split_unescaped, unescape_or_raw};
use crate::Result;

use super::super::bind::push_text;
use super::super::{BindValue, ResolvedParam, SearchModifier};
use super::{invalid_value, join_or};

pub(super) enum TokenSearchValue {
    AnySystemCode(String),
    NoSystemCode(String),
    SystemOnly(String),
    SystemCode { system: String, code: String },
}

pub(super) fn parse_token_value(raw: &str) -> TokenSearchValue {
    let parts = split_unescaped(raw, '|');
    match parts.len() {
        1 => TokenSearchValue::AnySystemCode(unescape_or_raw(parts[0])),
        2 => {
            let left = unescape_or_raw(parts[0]);
            let right = unescape_or_raw(parts[1]);
            if left.is_empty() {
                return TokenSearchValue::NoSystemCode(right);
            }
            if right.is_empty() {
                return TokenSearchValue::SystemOnly(left);
            }
            TokenSearchValue::SystemCode {
                system: left,
                code: right,
            }
        }
        _ => TokenSearchValue::AnySystemCode(raw.to_string()),
    }
}

/// Token columns hold bare codes, so every `system|code` form compares on the code.
pub(super) fn build_token_clause(
    resolved: &ResolvedParam<'_>,
    bind_params: &mut Vec<BindValue>,
) -> Result<Option<String>> {
    let column = &resolved.descriptor.column;
    let mut parts = Vec::new();
    for v in &resolved.values {
        let code = match parse_token_value(&v.raw) {
            TokenSearchValue::AnySystemCode(code)
            | TokenSearchValue::NoSystemCode(code)
            | TokenSearchValue::SystemCode { code, .. } => code,
            TokenSearchValue::SystemOnly(_) => {
                return Err(invalid_value(resolved, &v.raw, "a code"));
            }
        };
        if code.is_empty() {
            continue;
        }
        let idx = push_text(bind_params, code);
        parts.push(format!("{} = ${}", column, idx));
    }

    let Some(clause) = join_or(parts) else {
        return Ok(None);
    };

    if resolved.modifier == Some(SearchModifier::Not) {
        // :not also matches rows without any value
        return Ok(Some(format!("({} IS NULL OR NOT {})", column, wrap(&clause))));
    }
    Ok(Some(clause))
}

fn wrap(clause: &str) -> String {
    if clause.starts_with('(') {
        clause.to_string()
    } else {
        format!("({})", clause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_value_forms() {
        assert!(matches!(
            parse_token_value("active"),
            TokenSearchValue::AnySystemCode(c) if c == "active"
        ));
        assert!(matches!(
            parse_token_value("|active"),
            TokenSearchValue::NoSystemCode(c) if c == "active"
        ));
        assert!(matches!(
            parse_token_value("http://loinc.org|"),
            TokenSearchValue::SystemOnly(s) if s == "http://loinc.org"
        ));
        assert!(matches!(
            parse_token_value("http://loinc.org|718-7"),
            TokenSearchValue::SystemCode { system, code } if system == "http://loinc.org" && code == "718-7"
        ));
        assert!(matches!(
            parse_token_value("a\\|b"),
            TokenSearchValue::AnySystemCode(c) if c == "a|b"
        ));
    }
}
