use minipress_common::{Error, Result, is_valid_identifier};

/// Qualify `name` with the schema namespace, refusing anything that is not
/// a plain identifier on either side.
pub(crate) fn qualify(schema: &str, name: &str) -> Result<String> {
    if !is_valid_identifier(schema) {
        return Err(Error::Database(format!("invalid schema name: {schema:?}")));
    }
    if !is_valid_identifier(name) {
        return Err(Error::Database(format!("invalid table name: {name:?}")));
    }
    Ok(format!("{schema}.{name}"))
}
