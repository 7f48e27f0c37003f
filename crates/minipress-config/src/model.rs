use std::path::PathBuf;

use minipress_common::{Error, Result, is_valid_identifier};
use serde::{Deserialize, Serialize};

/// Where a store's database lives.
///
/// Serialized either as the keyword `in_memory` or as a `{ file: path }`
/// mapping, in both YAML and TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DatabaseLocationRepr", into = "DatabaseLocationRepr")]
pub enum DatabaseLocation {
    /// A database file on disk.
    File(PathBuf),
    /// A private in-memory database, mostly useful for tests.
    InMemory,
}

/// Wire shape for [`DatabaseLocation`]: a bare keyword or a file mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum DatabaseLocationRepr {
    Keyword(String),
    File { file: PathBuf },
}

impl TryFrom<DatabaseLocationRepr> for DatabaseLocation {
    type Error = String;

    fn try_from(repr: DatabaseLocationRepr) -> std::result::Result<Self, String> {
        match repr {
            DatabaseLocationRepr::Keyword(word) if word == "in_memory" => Ok(Self::InMemory),
            DatabaseLocationRepr::Keyword(word) => Err(format!(
                "unknown database location {word:?}, expected \"in_memory\" or a file mapping"
            )),
            DatabaseLocationRepr::File { file } => Ok(Self::File(file)),
        }
    }
}

impl From<DatabaseLocation> for DatabaseLocationRepr {
    fn from(location: DatabaseLocation) -> Self {
        match location {
            DatabaseLocation::File(file) => Self::File { file },
            DatabaseLocation::InMemory => Self::Keyword("in_memory".to_string()),
        }
    }
}

/// Configuration value object consumed by the record adapter and the
/// migration runner wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database: DatabaseLocation,
    /// Schema namespace that qualifies every table the store touches.
    pub schema_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::File(PathBuf::from("minipress.db")),
            schema_name: "main".to_string(),
        }
    }
}

impl StoreConfig {
    /// Check the parts that get interpolated into SQL text.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_identifier(&self.schema_name) {
            return Err(Error::Config(format!(
                "invalid schema name: {:?}",
                self.schema_name
            )));
        }
        Ok(())
    }
}
