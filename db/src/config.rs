//! Store configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! database: flightlog.sqlite
//! schema: schema/flightlog.yml
//! batch_size: 500
//! join_depth: 2
//! import_policy: skip_batch
//! ```
//!
//! Everything but `version` and `database` may be omitted.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flightbook_core::Depth;
use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, Result};

fn default_batch_size() -> usize {
    1000
}

fn default_join_depth() -> i64 {
    2
}

/// What an import does with a batch holding an unconvertible value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPolicy {
    /// Fail the whole import.
    #[default]
    Abort,
    /// Drop the batch, count it and continue.
    SkipBatch,
}

/// Settings for a [`Store`](crate::Store).
///
/// # Examples
///
/// ```
/// use flightbook_core::Depth;
/// use flightbook_db::{ImportPolicy, StoreConfig};
///
/// let config: StoreConfig = serde_yaml::from_str("version: '1.0'\ndatabase: ':memory:'").unwrap();
/// assert_eq!(config.batch_size, 1000);
/// assert_eq!(config.depth(), Depth::Limited(2));
/// assert_eq!(config.import_policy, ImportPolicy::Abort);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    /// Adapter-specific database identifier, e.g. a file path.
    pub database: String,
    /// Schema file to use instead of introspecting the database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<PathBuf>,
    /// Rows per insert call during imports.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Foreign-key hops for join selects; negative means unlimited.
    #[serde(default = "default_join_depth")]
    pub join_depth: i64,
    #[serde(default)]
    pub import_policy: ImportPolicy,
}

impl StoreConfig {
    /// A configuration with default settings for `database`.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            version: "1.0".into(),
            database: database.into(),
            schema: None,
            batch_size: default_batch_size(),
            join_depth: default_join_depth(),
            import_policy: ImportPolicy::default(),
        }
    }

    /// Loads and validates configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](DatabaseError::IoError) if the file cannot be
    /// read, [`YamlError`](DatabaseError::YamlError) if parsing fails, or
    /// [`InvalidConfig`](DatabaseError::InvalidConfig) if validation fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](DatabaseError::IoError) if the file cannot be
    /// written, or [`YamlError`](DatabaseError::YamlError) if serialization
    /// fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks the values serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(DatabaseError::InvalidConfig("database must not be empty".into()));
        }
        if self.batch_size == 0 {
            return Err(DatabaseError::InvalidConfig(
                "batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Join depth as a traversal budget.
    pub fn depth(&self) -> Depth {
        Depth::from_budget(self.join_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
database: flightlog.sqlite
schema: schema/flightlog.yml
batch_size: 250
join_depth: -1
import_policy: skip_batch
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: StoreConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.database, "flightlog.sqlite");
        assert_eq!(config.schema, Some(PathBuf::from("schema/flightlog.yml")));
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.depth(), Depth::Unlimited);
        assert_eq!(config.import_policy, ImportPolicy::SkipBatch);
    }

    #[test]
    fn test_defaults() {
        let config: StoreConfig =
            serde_yaml::from_str("version: \"1.0\"\ndatabase: x.db\n").unwrap();
        assert_eq!(config, StoreConfig::new("x.db"));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = StoreConfig::new("x.db");
        config.batch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(DatabaseError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_database() {
        assert!(StoreConfig::new("  ").validate().is_err());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.yml");

        let original: StoreConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(&path, "version: \"1.0\"\ndatabase: x.db\nbatch_size: 0\n").unwrap();
        assert!(matches!(
            StoreConfig::load(&path),
            Err(DatabaseError::InvalidConfig(_))
        ));
    }
}
