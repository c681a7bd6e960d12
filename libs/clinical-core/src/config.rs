//! Engine configuration.
//!
//! Values are layered in this order (later wins):
//! 1. built-in defaults
//! 2. `clinical-core.toml` in the working directory, or the file named by
//!    `CLINICAL_CORE_CONFIG`
//! 3. environment variables prefixed with `CLINICAL_CORE__`, e.g.
//!    `CLINICAL_CORE__SEARCH__MAX_COUNT=200`
//!
//! A `.env` file is read first so that step 3 also sees its values.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::search::{ParamDescriptor, SearchDomain};
use crate::{Error, Result};

const DEFAULT_CONFIG_FILE: &str = "clinical-core";
const CONFIG_FILE_ENV: &str = "CLINICAL_CORE_CONFIG";
const ENV_PREFIX: &str = "CLINICAL_CORE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub search: SearchConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
    /// Additional search domains declared in configuration.
    pub descriptors: Vec<DescriptorTableConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size used when a request carries no `_count`.
    pub default_count: i64,
    /// Larger `_count` values are clamped to this.
    pub max_count: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_count: 20,
            max_count: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub default_count: i64,
    pub max_count: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_count: 50,
            max_count: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
    pub json: bool,
    pub file: Option<LogFileConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFileConfig {
    pub directory: String,
    #[serde(default = "default_log_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub rotation: LogRotation,
}

fn default_log_prefix() -> String {
    "clinical-core.log".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Minutely,
    Never,
}

/// A search domain declared in configuration rather than in code.
///
/// Parameter types are kept as strings here and checked when the domain is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorTableConfig {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub order_by: String,
    pub parameters: Vec<DescriptorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub column: String,
}

impl DescriptorTableConfig {
    pub fn to_domain(&self) -> Result<SearchDomain> {
        let descriptors = self
            .parameters
            .iter()
            .map(|p| ParamDescriptor::from_config(&p.name, &p.param_type, &p.column))
            .collect::<Result<Vec<_>>>()?;

        SearchDomain::new(
            self.name.clone(),
            self.table.clone(),
            self.columns.clone(),
            descriptors,
            self.order_by.clone(),
        )
    }
}

impl EngineConfig {
    /// Load configuration from defaults, the optional config file and the environment.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let file = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single file, ignoring the environment.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?;
        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_page_sizes("search", self.search.default_count, self.search.max_count)?;
        validate_page_sizes(
            "history",
            self.history.default_count,
            self.history.max_count,
        )?;
        for table in &self.descriptors {
            table.to_domain()?;
        }
        Ok(())
    }

    /// Search domains declared in configuration.
    pub fn configured_domains(&self) -> Result<Vec<SearchDomain>> {
        self.descriptors.iter().map(|t| t.to_domain()).collect()
    }
}

fn validate_page_sizes(section: &str, default_count: i64, max_count: i64) -> Result<()> {
    if default_count < 1 || max_count < 1 {
        return Err(Error::InternalConfig(format!(
            "{section}: page sizes must be positive (default_count={default_count}, max_count={max_count})"
        )));
    }
    if default_count > max_count {
        return Err(Error::InternalConfig(format!(
            "{section}: default_count {default_count} exceeds max_count {max_count}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ParamType;
    use crate::ErrorKind;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.search.default_count, 20);
        assert_eq!(config.search.max_count, 100);
        assert_eq!(config.history.max_count, 500);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn default_above_max_is_rejected() {
        let mut config = EngineConfig::default();
        config.search.default_count = 500;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalConfig);
    }

    #[test]
    fn unknown_descriptor_type_is_internal_config() {
        let mut config = EngineConfig::default();
        config.descriptors.push(DescriptorTableConfig {
            name: "billing".to_string(),
            table: "invoices".to_string(),
            columns: vec!["id".to_string(), "amount".to_string()],
            order_by: "id".to_string(),
            parameters: vec![DescriptorConfig {
                name: "amount".to_string(),
                param_type: "money".to_string(),
                column: "amount".to_string(),
            }],
        });
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalConfig);
    }

    #[test]
    fn loads_file_with_descriptor_tables() {
        let dir =
            std::env::temp_dir().join(format!("clinical-core-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("engine.toml");
        std::fs::write(
            &path,
            r#"
[search]
default_count = 10
max_count = 50

[logging]
level = "debug"
json = true

[[descriptors]]
name = "allergies"
table = "allergy_intolerances"
columns = ["id", "patient_id", "code", "recorded_at"]
order_by = "recorded_at DESC"

[[descriptors.parameters]]
name = "patient"
type = "reference"
column = "patient_id"

[[descriptors.parameters]]
name = "recorded"
type = "date"
column = "recorded_at"
"#,
        )
        .unwrap();

        let config = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(config.search.default_count, 10);
        assert_eq!(config.history.default_count, 50);
        assert!(config.logging.json);

        let domains = config.configured_domains().unwrap();
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].table(), "allergy_intolerances");
        assert_eq!(domains[0].descriptors()[0].param_type, ParamType::Reference);

        std::fs::remove_dir_all(&dir).ok();
    }
}
