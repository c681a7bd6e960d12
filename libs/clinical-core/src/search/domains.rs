//! Search definitions for the clinical domains.
//!
//! Each domain bundles its table, selected columns, permitted parameters and default
//! ordering. Call sites pass a domain to [`SearchCompiler::build_for_domain`] explicitly.
//!
//! [`SearchCompiler::build_for_domain`]: super::SearchCompiler::build_for_domain

use super::{validate_identifier, ParamDescriptor, ParamType};
use crate::Result;

#[derive(Debug, Clone)]
pub struct SearchDomain {
    name: String,
    table: String,
    columns: Vec<String>,
    descriptors: Vec<ParamDescriptor>,
    order_by: String,
}

impl SearchDomain {
    /// Build a domain, checking that every identifier is safe to splice into SQL.
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<String>,
        descriptors: Vec<ParamDescriptor>,
        order_by: impl Into<String>,
    ) -> Result<Self> {
        let domain = Self {
            name: name.into(),
            table: table.into(),
            columns,
            descriptors,
            order_by: order_by.into(),
        };
        validate_identifier(&domain.table)?;
        for column in &domain.columns {
            validate_identifier(column)?;
        }
        for d in &domain.descriptors {
            validate_identifier(&d.column)?;
        }
        Ok(domain)
    }

    fn builtin(
        name: &str,
        table: &str,
        columns: &[&str],
        descriptors: &[ParamDescriptor],
        order_by: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            descriptors: descriptors.to_vec(),
            order_by: order_by.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn descriptors(&self) -> &[ParamDescriptor] {
        &self.descriptors
    }

    pub fn order_by(&self) -> &str {
        &self.order_by
    }

    pub fn descriptor(&self, name: &str) -> Option<&ParamDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }
}

pub const MESSAGE_POOL_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("name", ParamType::String, "name"),
    ParamDescriptor::new("status", ParamType::Token, "status"),
    ParamDescriptor::new("owner", ParamType::Reference, "owner_id"),
    ParamDescriptor::new("created", ParamType::Date, "created_at"),
    ParamDescriptor::new("active", ParamType::Boolean, "active"),
];

pub const INBOX_MESSAGE_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("recipient", ParamType::Reference, "recipient_id"),
    ParamDescriptor::new("sender", ParamType::Reference, "sender_id"),
    ParamDescriptor::new("pool", ParamType::Reference, "pool_id"),
    ParamDescriptor::new("status", ParamType::Token, "status"),
    ParamDescriptor::new("category", ParamType::Token, "category"),
    ParamDescriptor::new("subject", ParamType::String, "subject"),
    ParamDescriptor::new("sent", ParamType::Date, "sent_at"),
    ParamDescriptor::new("read", ParamType::Boolean, "is_read"),
];

pub const PREGNANCY_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("patient", ParamType::Reference, "patient_id"),
    ParamDescriptor::new("status", ParamType::Token, "status"),
    ParamDescriptor::new("outcome", ParamType::Token, "outcome"),
    ParamDescriptor::new("onset", ParamType::Date, "onset_date"),
    ParamDescriptor::new("due-date", ParamType::Date, "estimated_delivery_date"),
    ParamDescriptor::new("multiple", ParamType::Boolean, "is_multiple"),
];

pub const SURGICAL_CASE_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("patient", ParamType::Reference, "patient_id"),
    ParamDescriptor::new("surgeon", ParamType::Reference, "surgeon_id"),
    ParamDescriptor::new("status", ParamType::Token, "status"),
    ParamDescriptor::new("procedure", ParamType::Token, "procedure_code"),
    ParamDescriptor::new("theatre", ParamType::String, "theatre_name"),
    ParamDescriptor::new("date", ParamType::Date, "scheduled_start"),
    ParamDescriptor::new("emergency", ParamType::Boolean, "is_emergency"),
];

pub const RESEARCH_STUDY_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("identifier", ParamType::Token, "identifier"),
    ParamDescriptor::new("title", ParamType::String, "title"),
    ParamDescriptor::new("status", ParamType::Token, "status"),
    ParamDescriptor::new("phase", ParamType::Token, "phase"),
    ParamDescriptor::new("sponsor", ParamType::Reference, "sponsor_id"),
    ParamDescriptor::new("date", ParamType::Date, "start_date"),
];

pub const LAB_REPORT_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("patient", ParamType::Reference, "patient_id"),
    ParamDescriptor::new("performer", ParamType::Reference, "performer_id"),
    ParamDescriptor::new("code", ParamType::Token, "code"),
    ParamDescriptor::new("category", ParamType::Token, "category"),
    ParamDescriptor::new("status", ParamType::Token, "status"),
    ParamDescriptor::new("conclusion", ParamType::String, "conclusion"),
    ParamDescriptor::new("issued", ParamType::Date, "issued_at"),
];

pub const TERMINOLOGY_CODE_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("system", ParamType::Token, "system_url"),
    ParamDescriptor::new("code", ParamType::Token, "code"),
    ParamDescriptor::new("display", ParamType::String, "display"),
    ParamDescriptor::new("active", ParamType::Boolean, "active"),
];

pub fn message_pools() -> SearchDomain {
    SearchDomain::builtin(
        "MessagePool",
        "message_pools",
        &["id", "name", "status", "owner_id", "active", "created_at", "version_id"],
        MESSAGE_POOL_PARAMS,
        "created_at DESC, id",
    )
}

pub fn inbox_messages() -> SearchDomain {
    SearchDomain::builtin(
        "InboxMessage",
        "inbox_messages",
        &[
            "id",
            "pool_id",
            "sender_id",
            "recipient_id",
            "status",
            "category",
            "subject",
            "body",
            "is_read",
            "sent_at",
            "version_id",
        ],
        INBOX_MESSAGE_PARAMS,
        "sent_at DESC, id",
    )
}

pub fn pregnancies() -> SearchDomain {
    SearchDomain::builtin(
        "Pregnancy",
        "pregnancies",
        &[
            "id",
            "patient_id",
            "status",
            "outcome",
            "onset_date",
            "estimated_delivery_date",
            "is_multiple",
            "version_id",
        ],
        PREGNANCY_PARAMS,
        "onset_date DESC, id",
    )
}

pub fn surgical_cases() -> SearchDomain {
    SearchDomain::builtin(
        "SurgicalCase",
        "surgical_cases",
        &[
            "id",
            "patient_id",
            "surgeon_id",
            "status",
            "procedure_code",
            "theatre_name",
            "scheduled_start",
            "is_emergency",
            "version_id",
        ],
        SURGICAL_CASE_PARAMS,
        "scheduled_start DESC, id",
    )
}

pub fn research_studies() -> SearchDomain {
    SearchDomain::builtin(
        "ResearchStudy",
        "research_studies",
        &[
            "id",
            "identifier",
            "title",
            "status",
            "phase",
            "sponsor_id",
            "start_date",
            "version_id",
        ],
        RESEARCH_STUDY_PARAMS,
        "start_date DESC, id",
    )
}

pub fn lab_reports() -> SearchDomain {
    SearchDomain::builtin(
        "LabReport",
        "lab_reports",
        &[
            "id",
            "patient_id",
            "performer_id",
            "code",
            "category",
            "status",
            "conclusion",
            "issued_at",
            "version_id",
        ],
        LAB_REPORT_PARAMS,
        "issued_at DESC, id",
    )
}

pub fn terminology_codes() -> SearchDomain {
    SearchDomain::builtin(
        "TerminologyCode",
        "terminology_codes",
        &["id", "system_url", "code", "display", "active"],
        TERMINOLOGY_CODE_PARAMS,
        "system_url, code",
    )
}

/// Every built-in domain.
pub fn all() -> Vec<SearchDomain> {
    vec![
        message_pools(),
        inbox_messages(),
        pregnancies(),
        surgical_cases(),
        research_studies(),
        lab_reports(),
        terminology_codes(),
    ]
}
