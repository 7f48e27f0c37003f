use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("database not initialized: {0}")]
    NotInitialized(String),

    #[error("version record corrupted: {0}")]
    Corruption(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("bad yaml".into());
        assert_eq!(e.to_string(), "configuration error: bad yaml");

        let e = Error::Migration("duplicate version 3".into());
        assert_eq!(e.to_string(), "migration error: duplicate version 3");

        let e = Error::NotInitialized("no tracking table".into());
        assert_eq!(e.to_string(), "database not initialized: no tracking table");

        let e = Error::Other("misc".into());
        assert_eq!(e.to_string(), "misc");
    }
}
