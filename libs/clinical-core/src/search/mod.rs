//! Search-query compilation.
//!
//! Turns a table of permitted search parameters plus the request's query parameters into
//! a parameterized count statement and a paginated data statement:
//! - only parameters named in the descriptor table are applied
//! - user values only ever reach SQL through `$n` placeholders
//! - repeated keys are ANDed, comma-separated values are ORed

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

mod bind;
mod clauses;
mod compiler;
pub mod domains;
mod escape;
mod params;

pub use compiler::{CompiledQuery, SearchCompiler};
pub use domains::SearchDomain;
pub use params::{Page, COUNT_PARAM, OFFSET_PARAM};

/// Search parameter type, which decides the matching semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Exact equality on a code
    Token,
    /// Exact equality on a referenced id
    Reference,
    /// Case-insensitive substring match
    String,
    /// Range comparison on a date/timestamp column
    Date,
    Boolean,
}

impl ParamType {
    /// Parse a configured type name. Unknown names are a configuration error, not a
    /// request error.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "token" => Ok(Self::Token),
            "reference" => Ok(Self::Reference),
            "string" => Ok(Self::String),
            "date" => Ok(Self::Date),
            "boolean" => Ok(Self::Boolean),
            other => Err(Error::InternalConfig(format!(
                "unknown search parameter type '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Reference => "reference",
            Self::String => "string",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }
}

/// A permitted search parameter and the column it filters on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: Cow<'static, str>,
    pub param_type: ParamType,
    pub column: Cow<'static, str>,
}

impl ParamDescriptor {
    pub const fn new(name: &'static str, param_type: ParamType, column: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            param_type,
            column: Cow::Borrowed(column),
        }
    }

    pub fn from_config(name: &str, type_name: &str, column: &str) -> Result<Self> {
        let param_type = ParamType::parse(type_name).map_err(|_| {
            Error::InternalConfig(format!(
                "search parameter '{name}' has unknown type '{type_name}'"
            ))
        })?;
        validate_identifier(column)?;
        Ok(Self {
            name: Cow::Owned(name.to_string()),
            param_type,
            column: Cow::Owned(column.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPrefix {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Sa,
    Eb,
    Ap,
}

impl SearchPrefix {
    pub fn parse_prefix(value: &str) -> (Option<Self>, &str) {
        // Prefixes only apply when they are immediately at the start of the string.
        let candidates = [
            ("eq", Self::Eq),
            ("ne", Self::Ne),
            ("gt", Self::Gt),
            ("lt", Self::Lt),
            ("ge", Self::Ge),
            ("le", Self::Le),
            ("sa", Self::Sa),
            ("eb", Self::Eb),
            ("ap", Self::Ap),
        ];
        for (s, p) in candidates {
            if let Some(rest) = value.strip_prefix(s) {
                return (Some(p), rest);
            }
        }
        (None, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchModifier {
    Missing,
    Exact,
    Contains,
    Not,
}

impl SearchModifier {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "missing" => Some(Self::Missing),
            "exact" => Some(Self::Exact),
            "contains" => Some(Self::Contains),
            "not" => Some(Self::Not),
            _ => None,
        }
    }

    pub fn is_valid_for(&self, param_type: ParamType) -> bool {
        match self {
            Self::Missing => true,
            Self::Exact | Self::Contains => param_type == ParamType::String,
            Self::Not => param_type == ParamType::Token,
        }
    }
}

/// Positional argument for a compiled statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

#[derive(Debug, Clone)]
pub struct SearchValue {
    pub raw: String,
}

/// One request occurrence of a permitted parameter.
#[derive(Debug, Clone)]
pub struct ResolvedParam<'d> {
    pub descriptor: &'d ParamDescriptor,
    pub modifier: Option<SearchModifier>,
    /// OR values for this occurrence
    pub values: Vec<SearchValue>,
}

/// Accepts `name`, `alias.name` and `schema.table` style identifiers.
pub(crate) fn validate_identifier(ident: &str) -> Result<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let parts: Vec<&str> = ident.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|p| valid_part(p)) {
        return Err(Error::InternalConfig(format!(
            "'{ident}' is not a valid SQL identifier"
        )));
    }
    Ok(())
}
