//! Reading and writing schema files.
//!
//! The format follows the file extension: `.json` for JSON, `.yml` or
//! `.yaml` for YAML. Both hold a [`SchemaDescriptor`].

use std::io::{BufReader, BufWriter};
use std::path::Path;

use flightbook_core::{Schema, SchemaDescriptor};
use tracing::debug;

use crate::error::{DatabaseError, Result};

/// On-disk encoding of a schema file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Json,
    Yaml,
}

impl SchemaFormat {
    /// Picks the format from the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidConfig`] for other extensions.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("yml" | "yaml") => Ok(Self::Yaml),
            _ => Err(DatabaseError::InvalidConfig(format!(
                "unsupported schema file extension: {}",
                path.display()
            ))),
        }
    }
}

/// Loads a schema file.
///
/// # Errors
///
/// Fails on unknown extensions, I/O and parse errors, and on descriptors
/// that do not form valid tables.
pub fn load(path: impl AsRef<Path>) -> Result<Schema> {
    let path = path.as_ref();
    let format = SchemaFormat::from_path(path)?;
    let reader = BufReader::new(std::fs::File::open(path)?);
    let desc: SchemaDescriptor = match format {
        SchemaFormat::Json => serde_json::from_reader(reader)?,
        SchemaFormat::Yaml => serde_yaml::from_reader(reader)?,
    };
    let schema = Schema::from_descriptors(&desc)?;
    debug!(path = %path.display(), tables = schema.len(), "loaded schema file");
    Ok(schema)
}

/// Writes `schema` to a file.
///
/// # Errors
///
/// Fails on unknown extensions, I/O and serialization errors.
pub fn save(schema: &Schema, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let format = SchemaFormat::from_path(path)?;
    let writer = BufWriter::new(std::fs::File::create(path)?);
    let desc = schema.to_descriptors();
    match format {
        SchemaFormat::Json => serde_json::to_writer_pretty(writer, &desc)?,
        SchemaFormat::Yaml => serde_yaml::to_writer(writer, &desc)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightbook_core::flightlog;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            SchemaFormat::from_path(Path::new("a/schema.json")).unwrap(),
            SchemaFormat::Json
        );
        assert_eq!(
            SchemaFormat::from_path(Path::new("schema.yaml")).unwrap(),
            SchemaFormat::Yaml
        );
        assert!(SchemaFormat::from_path(Path::new("schema.toml")).is_err());
        assert!(SchemaFormat::from_path(Path::new("schema")).is_err());
    }

    #[test]
    fn test_roundtrip_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let schema = flightlog::schema();
        for name in ["schema.json", "schema.yml"] {
            let path = dir.path().join(name);
            save(&schema, &path).unwrap();
            assert_eq!(load(&path).unwrap(), schema, "{name}");
        }
    }

    #[test]
    fn test_invalid_reference_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(
            &path,
            "missions:\n  columns:\n    - { name: pilot, type: INTEGER, reference: people }\n",
        )
        .unwrap();
        assert!(matches!(load(&path), Err(DatabaseError::Schema(_))));
    }
}
