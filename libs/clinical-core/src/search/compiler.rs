use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::{Query, QueryScalar};

use super::bind::push_bind;
use super::params::{resolve_params, Page};
use super::{clauses, validate_identifier, BindValue, ParamDescriptor, SearchDomain};
use crate::config::SearchConfig;
use crate::{Error, Result};

/// Count and data statements for one search request.
///
/// Both statements share the same WHERE clause and arguments; the data statement appends
/// `LIMIT`/`OFFSET` as its last two placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub count_sql: String,
    pub count_args: Vec<BindValue>,
    pub data_sql: String,
    pub data_args: Vec<BindValue>,
    pub page: Page,
}

impl CompiledQuery {
    /// Arguments shared by both statements.
    pub fn where_args(&self) -> &[BindValue] {
        &self.count_args
    }

    /// `SELECT COUNT(*)` statement with its arguments bound.
    pub fn count_statement(&self) -> QueryScalar<'_, Postgres, i64, PgArguments> {
        let mut query = sqlx::query_scalar::<_, i64>(&self.count_sql);
        for value in &self.count_args {
            query = match value {
                BindValue::Text(v) => query.bind(v.as_str()),
                BindValue::Integer(v) => query.bind(*v),
                BindValue::Boolean(v) => query.bind(*v),
            };
        }
        query
    }

    /// Paginated data statement with its arguments bound.
    pub fn data_statement(&self) -> Query<'_, Postgres, PgArguments> {
        let mut query = sqlx::query(&self.data_sql);
        for value in &self.data_args {
            query = match value {
                BindValue::Text(v) => query.bind(v.as_str()),
                BindValue::Integer(v) => query.bind(*v),
                BindValue::Boolean(v) => query.bind(*v),
            };
        }
        query
    }
}

/// Stateless search-to-SQL compiler.
///
/// Holds only paging limits, so a single instance can be shared freely.
#[derive(Debug, Clone)]
pub struct SearchCompiler {
    default_count: i64,
    max_count: i64,
}

impl Default for SearchCompiler {
    fn default() -> Self {
        Self::new(&SearchConfig::default())
    }
}

impl SearchCompiler {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            default_count: config.default_count,
            max_count: config.max_count,
        }
    }

    /// Compile a search over `table`.
    ///
    /// `order_by` is trusted caller text appended verbatim; it must never be derived from
    /// request input.
    pub fn build<C: AsRef<str>>(
        &self,
        table: &str,
        all_columns: &[C],
        descriptors: &[ParamDescriptor],
        request: &[(String, String)],
        order_by: &str,
    ) -> Result<CompiledQuery> {
        validate_identifier(table)?;
        if all_columns.is_empty() {
            return Err(Error::InternalConfig(format!(
                "no columns selected for table '{table}'"
            )));
        }
        for column in all_columns {
            validate_identifier(column.as_ref())?;
        }
        for descriptor in descriptors {
            validate_identifier(&descriptor.column)?;
        }

        let page = Page::from_request(request, self.default_count, self.max_count)?;
        let resolved = resolve_params(descriptors, request)?;

        let mut bind_params = Vec::new();
        let mut conditions = Vec::new();
        for param in &resolved {
            if let Some(clause) = clauses::build_param_clause(param, &mut bind_params)? {
                conditions.push(clause);
            }
        }

        let where_sql = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM {}{}", table, where_sql);
        let count_args = bind_params.clone();

        let columns = all_columns
            .iter()
            .map(|c| c.as_ref())
            .collect::<Vec<_>>()
            .join(", ");
        let mut data_sql = format!("SELECT {} FROM {}{}", columns, table, where_sql);
        let order_by = order_by.trim();
        if !order_by.is_empty() {
            data_sql.push_str(" ORDER BY ");
            data_sql.push_str(order_by);
        }

        let mut data_args = bind_params;
        let limit_idx = push_bind(&mut data_args, BindValue::Integer(page.limit));
        let offset_idx = push_bind(&mut data_args, BindValue::Integer(page.offset));
        data_sql.push_str(&format!(" LIMIT ${} OFFSET ${}", limit_idx, offset_idx));

        tracing::debug!(
            table,
            conditions = conditions.len(),
            args = count_args.len(),
            limit = page.limit,
            offset = page.offset,
            "Compiled search query"
        );

        Ok(CompiledQuery {
            count_sql,
            count_args,
            data_sql,
            data_args,
            page,
        })
    }

    /// Compile a search against one of the configured domains.
    pub fn build_for_domain(
        &self,
        domain: &SearchDomain,
        request: &[(String, String)],
    ) -> Result<CompiledQuery> {
        self.build(
            domain.table(),
            domain.columns(),
            domain.descriptors(),
            request,
            domain.order_by(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ParamType;
    use crate::ErrorKind;

    const CASES: &[ParamDescriptor] = &[
        ParamDescriptor::new("patient", ParamType::Reference, "patient_id"),
        ParamDescriptor::new("status", ParamType::Token, "status"),
        ParamDescriptor::new("procedure", ParamType::String, "procedure_name"),
        ParamDescriptor::new("date", ParamType::Date, "scheduled_at"),
        ParamDescriptor::new("emergency", ParamType::Boolean, "is_emergency"),
    ];

    const COLUMNS: &[&str] = &["id", "patient_id", "status", "scheduled_at"];

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn compile(items: &[(&str, &str)]) -> Result<CompiledQuery> {
        SearchCompiler::default().build(
            "surgical_cases",
            COLUMNS,
            CASES,
            &pairs(items),
            "scheduled_at DESC, id",
        )
    }

    #[test]
    fn no_parameters_compiles_unfiltered_queries() {
        let q = compile(&[]).unwrap();
        assert_eq!(q.count_sql, "SELECT COUNT(*) FROM surgical_cases");
        assert_eq!(
            q.data_sql,
            "SELECT id, patient_id, status, scheduled_at FROM surgical_cases ORDER BY scheduled_at DESC, id LIMIT $1 OFFSET $2"
        );
        assert!(q.count_args.is_empty());
        assert_eq!(
            q.data_args,
            vec![BindValue::Integer(20), BindValue::Integer(0)]
        );
    }

    #[test]
    fn token_and_reference_use_equality() {
        let q = compile(&[("status", "scheduled"), ("patient", "Patient/p1")]).unwrap();
        assert_eq!(
            q.count_sql,
            "SELECT COUNT(*) FROM surgical_cases WHERE patient_id = $1 AND status = $2"
        );
        assert_eq!(
            q.count_args,
            vec![
                BindValue::Text("p1".to_string()),
                BindValue::Text("scheduled".to_string())
            ]
        );
        assert!(q.data_sql.ends_with("LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn comma_values_are_ored_and_repeats_are_anded() {
        let q = compile(&[("status", "scheduled,in-progress"), ("status", "booked")]).unwrap();
        assert_eq!(
            q.count_sql,
            "SELECT COUNT(*) FROM surgical_cases WHERE (status = $1 OR status = $2) AND status = $3"
        );
    }

    #[test]
    fn string_search_is_case_insensitive_substring() {
        let q = compile(&[("procedure", "Knee_100%")]).unwrap();
        assert_eq!(
            q.count_sql,
            "SELECT COUNT(*) FROM surgical_cases WHERE procedure_name ILIKE $1 ESCAPE E'\\\\'"
        );
        assert_eq!(
            q.count_args,
            vec![BindValue::Text("%Knee\\_100\\%%".to_string())]
        );

        let q = compile(&[("procedure:exact", "Knee arthroscopy")]).unwrap();
        assert!(q.count_sql.ends_with("WHERE procedure_name = $1"));
    }

    #[test]
    fn date_prefixes_compile_to_ranges() {
        let q = compile(&[("date", "ge2024-05-01"), ("date", "lt2024-06")]).unwrap();
        assert_eq!(
            q.count_sql,
            "SELECT COUNT(*) FROM surgical_cases WHERE scheduled_at >= $1::timestamptz AND scheduled_at < $2::timestamptz"
        );
        assert_eq!(
            q.count_args,
            vec![
                BindValue::Text("2024-05-01T00:00:00+00:00".to_string()),
                BindValue::Text("2024-06-01T00:00:00+00:00".to_string()),
            ]
        );

        let q = compile(&[("date", "2024-05-01")]).unwrap();
        assert!(q
            .count_sql
            .contains("(scheduled_at >= $1::timestamptz AND scheduled_at < $2::timestamptz)"));
    }

    #[test]
    fn boolean_and_missing() {
        let q = compile(&[("emergency", "TRUE"), ("date:missing", "true")]).unwrap();
        assert_eq!(
            q.count_sql,
            "SELECT COUNT(*) FROM surgical_cases WHERE scheduled_at IS NULL AND is_emergency = $1"
        );
        assert_eq!(q.count_args, vec![BindValue::Boolean(true)]);
    }

    #[test]
    fn token_not_includes_missing_values() {
        let q = compile(&[("status:not", "cancelled")]).unwrap();
        assert!(q
            .count_sql
            .ends_with("WHERE (status IS NULL OR NOT (status = $1))"));
    }

    #[test]
    fn uncoercible_values_are_invalid_parameters() {
        for items in [
            [("date", "next tuesday")],
            [("emergency", "maybe")],
            [("patient", "Patient/1/_history/2")],
            [("status", "http://example.org/status|")],
            [("date", "2024-01-01T10:00+99999999:00")],
            [("date", "2024-01-01T10:00+0530")],
            [("date", "ge2024-01-01T10:00-24:00")],
            [("date", "+262142-12-31T23:59:59Z")],
            [("date", "lt10000-01-01")],
        ] {
            let err = compile(&items).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter, "{items:?}");
        }
    }

    #[test]
    fn approximate_dates_compile_on_boundary_years() {
        for raw in ["ap9999", "ap9999-12-31T23:59:59Z", "ap0000", "ap0001-01-01"] {
            let q = compile(&[("date", raw)]).unwrap();
            assert_eq!(q.count_args.len(), 2, "{raw}");
        }
    }

    #[test]
    fn unsafe_configuration_is_internal_config() {
        let compiler = SearchCompiler::default();
        let err = compiler
            .build("cases; DROP TABLE x", COLUMNS, CASES, &[], "id")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalConfig);

        let bad = [ParamDescriptor::new("status", ParamType::Token, "status --")];
        let err = compiler
            .build("surgical_cases", COLUMNS, &bad, &[], "id")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalConfig);

        let none: &[&str] = &[];
        let err = compiler
            .build("surgical_cases", none, CASES, &[], "id")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalConfig);
    }

    #[test]
    fn paging_is_clamped() {
        let q = compile(&[("_count", "1000"), ("_offset", "60")]).unwrap();
        assert_eq!(q.page, Page { limit: 100, offset: 60 });
        assert_eq!(
            &q.data_args[q.data_args.len() - 2..],
            &[BindValue::Integer(100), BindValue::Integer(60)]
        );
    }
}
