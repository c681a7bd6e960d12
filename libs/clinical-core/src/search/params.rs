//! Request parameter resolution.

use std::collections::HashSet;

use super::escape::split_unescaped;
use super::{ParamDescriptor, ResolvedParam, SearchModifier, SearchValue};
use crate::{Error, Result};

/// Page size parameter
pub const COUNT_PARAM: &str = "_count";
/// Number of matching rows to skip
pub const OFFSET_PARAM: &str = "_offset";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Read `_count` / `_offset` from the request.
    ///
    /// The last occurrence of each wins. A `_count` above `max_count` is clamped;
    /// negative or non-numeric values are rejected.
    pub(crate) fn from_request(
        request: &[(String, String)],
        default_count: i64,
        max_count: i64,
    ) -> Result<Self> {
        let mut limit = default_count;
        let mut offset = 0;

        for (key, value) in request {
            match key.as_str() {
                COUNT_PARAM => limit = parse_non_negative(COUNT_PARAM, value)?.min(max_count),
                OFFSET_PARAM => offset = parse_non_negative(OFFSET_PARAM, value)?,
                _ => {}
            }
        }

        Ok(Self { limit, offset })
    }
}

pub(crate) fn parse_non_negative(name: &str, value: &str) -> Result<i64> {
    let parsed: i64 = value.trim().parse().map_err(|_| {
        Error::InvalidParameter(format!("{name} must be an integer, got '{value}'"))
    })?;
    if parsed < 0 {
        return Err(Error::InvalidParameter(format!(
            "{name} must not be negative, got {parsed}"
        )));
    }
    Ok(parsed)
}

/// Match request pairs against the descriptor table.
///
/// Output follows descriptor order, then request order for repeated keys. Keys whose base
/// name is not in the table are ignored.
pub(crate) fn resolve_params<'d>(
    descriptors: &'d [ParamDescriptor],
    request: &[(String, String)],
) -> Result<Vec<ResolvedParam<'d>>> {
    let mut seen = HashSet::new();
    for d in descriptors {
        if !seen.insert(&*d.name) {
            return Err(Error::InternalConfig(format!(
                "search parameter '{}' is declared more than once",
                d.name
            )));
        }
    }

    let mut resolved = Vec::new();
    for descriptor in descriptors {
        for (key, value) in request {
            let (base, modifier) = match key.split_once(':') {
                Some((base, modifier)) => (base, Some(modifier)),
                None => (key.as_str(), None),
            };
            if base != descriptor.name {
                continue;
            }

            let modifier = modifier
                .map(|m| parse_modifier(descriptor, m))
                .transpose()?;

            let values: Vec<SearchValue> = split_unescaped(value, ',')
                .into_iter()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| SearchValue { raw: v.to_string() })
                .collect();
            if values.is_empty() {
                continue;
            }

            resolved.push(ResolvedParam {
                descriptor,
                modifier,
                values,
            });
        }
    }

    Ok(resolved)
}

fn parse_modifier(descriptor: &ParamDescriptor, raw: &str) -> Result<SearchModifier> {
    let modifier = SearchModifier::parse(raw).ok_or_else(|| {
        Error::InvalidParameter(format!(
            "unknown modifier ':{raw}' on parameter '{}'",
            descriptor.name
        ))
    })?;
    if !modifier.is_valid_for(descriptor.param_type) {
        return Err(Error::InvalidParameter(format!(
            "modifier ':{raw}' is not valid for {} parameter '{}'",
            descriptor.param_type.as_str(),
            descriptor.name
        )));
    }
    Ok(modifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ParamType;
    use crate::ErrorKind;

    const TABLE: &[ParamDescriptor] = &[
        ParamDescriptor::new("status", ParamType::Token, "status"),
        ParamDescriptor::new("subject", ParamType::String, "subject"),
    ];

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn resolution_follows_descriptor_order() {
        let request = pairs(&[("subject", "knee"), ("status", "active,draft"), ("foo", "bar")]);
        let resolved = resolve_params(TABLE, &request).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].descriptor.name, "status");
        assert_eq!(resolved[0].values.len(), 2);
        assert_eq!(resolved[1].descriptor.name, "subject");
    }

    #[test]
    fn empty_values_are_skipped() {
        let request = pairs(&[("status", ""), ("status", " , ")]);
        assert!(resolve_params(TABLE, &request).unwrap().is_empty());
    }

    #[test]
    fn invalid_modifier_is_rejected() {
        let request = pairs(&[("status:exact", "active")]);
        let err = resolve_params(TABLE, &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        let request = pairs(&[("subject:sounds-like", "knee")]);
        assert!(resolve_params(TABLE, &request).is_err());
    }

    #[test]
    fn modifier_on_unknown_parameter_is_ignored() {
        let request = pairs(&[("unknown:exact", "x")]);
        assert!(resolve_params(TABLE, &request).unwrap().is_empty());
    }

    #[test]
    fn duplicate_descriptor_is_internal_config() {
        let table = [
            ParamDescriptor::new("status", ParamType::Token, "status"),
            ParamDescriptor::new("status", ParamType::String, "status_text"),
        ];
        let err = resolve_params(&table, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalConfig);
    }

    #[test]
    fn page_defaults_and_clamping() {
        assert_eq!(
            Page::from_request(&[], 20, 100).unwrap(),
            Page {
                limit: 20,
                offset: 0
            }
        );
        let request = pairs(&[("_count", "500"), ("_offset", "40")]);
        assert_eq!(
            Page::from_request(&request, 20, 100).unwrap(),
            Page {
                limit: 100,
                offset: 40
            }
        );
    }

    #[test]
    fn negative_or_garbage_paging_is_rejected() {
        for (k, v) in [("_count", "-1"), ("_offset", "-5"), ("_count", "ten")] {
            let err = Page::from_request(&pairs(&[(k, v)]), 20, 100).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        }
    }
}
