//! Search compilation across the built-in clinical domains

use clinical_core::config::SearchConfig;
use clinical_core::search::{domains, BindValue, SearchCompiler};
use clinical_core::ErrorKind;

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Request maps that only use parameters declared by the lab report domain.
fn lab_requests() -> Vec<Vec<(String, String)>> {
    vec![
        pairs(&[]),
        pairs(&[("patient", "Patient/p-7")]),
        pairs(&[("status", "final,amended"), ("code", "http://loinc.org|2345-7")]),
        pairs(&[("conclusion", "normal"), ("issued", "ge2024-01")]),
        pairs(&[
            ("issued", "ge2024-01-01"),
            ("issued", "lt2024-02-01"),
            ("performer", "Practitioner/dr-2"),
            ("category:not", "imaging"),
            ("conclusion:missing", "false"),
            ("_count", "5"),
            ("_offset", "10"),
        ]),
    ]
}

#[test]
fn count_and_data_share_where_arguments() -> anyhow::Result<()> {
    let compiler = SearchCompiler::default();
    let domain = domains::lab_reports();

    for request in lab_requests() {
        let q = compiler.build_for_domain(&domain, &request)?;
        let n = q.count_args.len();

        assert_eq!(q.data_args.len(), n + 2, "{request:?}");
        assert_eq!(&q.data_args[..n], q.count_args.as_slice(), "{request:?}");
        assert_eq!(
            &q.data_args[n..],
            &[
                BindValue::Integer(q.page.limit),
                BindValue::Integer(q.page.offset)
            ]
        );

        let where_clause = q
            .count_sql
            .strip_prefix("SELECT COUNT(*) FROM lab_reports")
            .expect("count statement prefix");
        assert!(q.data_sql.contains(&format!("FROM lab_reports{where_clause}")));
        assert!(q
            .data_sql
            .ends_with(&format!("LIMIT ${} OFFSET ${}", n + 1, n + 2)));
    }
    Ok(())
}

#[test]
fn undeclared_keys_have_no_effect() -> anyhow::Result<()> {
    let compiler = SearchCompiler::default();
    let domain = domains::lab_reports();

    for request in lab_requests() {
        let baseline = compiler.build_for_domain(&domain, &request)?;

        let mut noisy = request.clone();
        noisy.insert(0, ("_format".to_string(), "json".to_string()));
        noisy.push(("surgeon".to_string(), "Practitioner/x".to_string()));
        noisy.push(("status-reason".to_string(), "'; DROP TABLE lab_reports; --".to_string()));

        assert_eq!(compiler.build_for_domain(&domain, &noisy)?, baseline);
    }
    Ok(())
}

#[test]
fn user_values_never_reach_sql_text() -> anyhow::Result<()> {
    let hostile = "x' OR '1'='1";
    let request = pairs(&[("subject", hostile), ("status", hostile), ("sender", hostile)]);
    let q = SearchCompiler::default().build_for_domain(&domains::inbox_messages(), &request)?;

    assert!(!q.count_sql.contains(hostile));
    assert!(!q.data_sql.contains(hostile));
    assert!(q
        .count_args
        .contains(&BindValue::Text(hostile.to_string())));
    Ok(())
}

#[test]
fn request_order_does_not_change_numbering() -> anyhow::Result<()> {
    let compiler = SearchCompiler::default();
    let domain = domains::surgical_cases();
    let a = compiler.build_for_domain(
        &domain,
        &pairs(&[("status", "booked"), ("patient", "p1"), ("emergency", "true")]),
    )?;
    let b = compiler.build_for_domain(
        &domain,
        &pairs(&[("emergency", "true"), ("patient", "p1"), ("status", "booked")]),
    )?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn paging_limits_come_from_configuration() -> anyhow::Result<()> {
    let compiler = SearchCompiler::new(&SearchConfig {
        default_count: 10,
        max_count: 25,
    });
    let domain = domains::research_studies();

    let q = compiler.build_for_domain(&domain, &[])?;
    assert_eq!((q.page.limit, q.page.offset), (10, 0));

    let q = compiler.build_for_domain(&domain, &pairs(&[("_count", "500")]))?;
    assert_eq!(q.page.limit, 25);

    for bad in ["-1", "ten"] {
        let err = compiler
            .build_for_domain(&domain, &pairs(&[("_count", bad)]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
    let err = compiler
        .build_for_domain(&domain, &pairs(&[("_offset", "-3")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    Ok(())
}

#[test]
fn terminology_code_search() -> anyhow::Result<()> {
    let q = SearchCompiler::default().build_for_domain(
        &domains::terminology_codes(),
        &pairs(&[("system", "http://loinc.org"), ("display", "glucose"), ("active", "true")]),
    )?;
    assert_eq!(
        q.count_sql,
        "SELECT COUNT(*) FROM terminology_codes WHERE system_url = $1 AND display ILIKE $2 ESCAPE E'\\\\' AND active = $3"
    );
    assert_eq!(
        q.count_args,
        vec![
            BindValue::Text("http://loinc.org".to_string()),
            BindValue::Text("%glucose%".to_string()),
            BindValue::Boolean(true),
        ]
    );
    Ok(())
}

#[test]
fn malformed_dates_are_invalid_parameters() {
    let compiler = SearchCompiler::default();
    let domain = domains::pregnancies();

    for raw in [
        "2024-01-01T10:00+99999999:00",
        "2024-01-01T10:00+05:60",
        "2024-01-01T10:00+0100",
        "+262142-12-31T23:59:59Z",
        "sa10000",
        "2024-02-30",
    ] {
        let err = compiler
            .build_for_domain(&domain, &pairs(&[("due-date", raw)]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter, "{raw}");
    }
}
