//! Host configuration for record lifecycle workflows.
//!
//! # Responsibility
//! - Load retention, seeding, database and logging settings from JSON.
//! - Supply workflow inputs as immutable values; services never read config.
//!
//! # Invariants
//! - Every section is optional and falls back to documented defaults.
//! - Unknown keys are rejected so typos do not silently apply defaults.
//!
//! # Example
//!
//! ```json
//! {
//!   "business_rules": { "data_retention_days": 30, "batch_operation_prefix": "Batch-" },
//!   "seed_data": { "products": ["Alpha", "Beta", "Gamma"] },
//!   "database": { "path": "records.db" },
//!   "logging": { "level": "info", "dir": "/var/log/recordkeep" }
//! }
//! ```

use crate::model::record::validate_record_name;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordKeepConfig {
    #[serde(default)]
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub seed_data: SeedData,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Retention and seeding rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusinessRules {
    /// Records older than this many days are purged.
    /// Default: 30
    #[serde(default = "default_retention_days")]
    pub data_retention_days: u32,

    /// Prepended to every seed catalog entry.
    /// Default: "Batch-"
    #[serde(default = "default_batch_prefix")]
    pub batch_operation_prefix: String,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            data_retention_days: default_retention_days(),
            batch_operation_prefix: default_batch_prefix(),
        }
    }
}

fn default_retention_days() -> u32 {
    30
}

fn default_batch_prefix() -> String {
    "Batch-".to_string()
}

/// Ordered seed catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedData {
    #[serde(default = "default_products")]
    pub products: Vec<String>,
}

impl Default for SeedData {
    fn default() -> Self {
        Self {
            products: default_products(),
        }
    }
}

fn default_products() -> Vec<String> {
    ["Alpha", "Beta", "Gamma"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite file path, relative to the working directory.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("records.db")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `trace|debug|info|warn|error`; build-mode default when absent.
    #[serde(default)]
    pub level: Option<String>,
    /// Absolute directory for rolling log files; logging stays off when absent.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Configuration loading failure.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config file `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Validation(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Validation(_) => None,
        }
    }
}

impl RecordKeepConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parses and validates a JSON config document.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every seed entry yields a storable record name.
    fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.business_rules.batch_operation_prefix;
        for product in &self.seed_data.products {
            if product.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "seed_data.products must not contain blank entries".to_string(),
                ));
            }
            validate_record_name(&format!("{prefix}{product}")).map_err(|err| {
                ConfigError::Validation(format!("seed product `{product}`: {err}"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, RecordKeepConfig};
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RecordKeepConfig::from_json("{}").unwrap();
        assert_eq!(config.business_rules.data_retention_days, 30);
        assert_eq!(config.business_rules.batch_operation_prefix, "Batch-");
        assert_eq!(config.seed_data.products, vec!["Alpha", "Beta", "Gamma"]);
        assert_eq!(config.database.path, PathBuf::from("records.db"));
        assert_eq!(config.logging.dir, None);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = RecordKeepConfig::from_json(
            r#"{ "business_rules": { "data_retention_days": 7 }, "seed_data": { "products": ["X"] } }"#,
        )
        .unwrap();
        assert_eq!(config.business_rules.data_retention_days, 7);
        assert_eq!(config.business_rules.batch_operation_prefix, "Batch-");
        assert_eq!(config.seed_data.products, vec!["X"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RecordKeepConfig::from_json(r#"{ "business_rules": { "retention": 1 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = RecordKeepConfig::from_json(r#"{ "BusinessRules": { "DataRetentionDays": 7 } }"#)
            .unwrap_err();
        assert!(err.to_string().contains("BusinessRules"));
    }

    #[test]
    fn negative_retention_is_a_parse_error() {
        let err =
            RecordKeepConfig::from_json(r#"{ "business_rules": { "data_retention_days": -1 } }"#)
                .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn blank_seed_products_are_rejected() {
        let err = RecordKeepConfig::from_json(r#"{ "seed_data": { "products": ["ok", " "] } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(message) if message.contains("blank")));
    }

    #[test]
    fn load_reads_file_and_reports_missing_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "business_rules": {{ "batch_operation_prefix": "Test-" }} }}"#
        )
        .unwrap();

        let config = RecordKeepConfig::load(file.path()).unwrap();
        assert_eq!(config.business_rules.batch_operation_prefix, "Test-");

        let missing = file.path().with_extension("missing");
        let err = RecordKeepConfig::load(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Io { path, .. } if path == missing));
    }
}
