use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, Statement};
use serde_json::Value;
use tracing::info;

use minipress_common::{Error, Record, Result, is_valid_identifier};
use minipress_config::{DatabaseLocation, StoreConfig};

use crate::sql::qualify;

/// Fixed output format for TIMESTAMP columns.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Generic record adapter bound to one table in one schema namespace.
///
/// Rows travel as [`Record`] values. Identifiers are serialized as strings
/// regardless of the underlying storage, and TIMESTAMP columns come back in
/// a fixed format (`2022-02-22 12:22:22.222222`).
pub struct RecordStore {
    conn: Mutex<Connection>,
    schema: String,
    table: String,
}

impl RecordStore {
    /// Wrap an existing connection. The caller is responsible for having
    /// migrated the schema first.
    pub fn new(conn: Connection, schema: &str, table: &str) -> Result<Self> {
        // Both names get interpolated into SQL text, so vet them up front.
        qualify(schema, table)?;
        Ok(Self {
            conn: Mutex::new(conn),
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    /// Open a store from configuration, applying the standard pragmas.
    pub fn open(config: &StoreConfig, table: &str) -> Result<Self> {
        config.validate()?;
        let conn = match &config.database {
            DatabaseLocation::File(path) => Connection::open(path)
                .map_err(|e| Error::Database(format!("failed to open database: {e}")))?,
            DatabaseLocation::InMemory => Connection::open_in_memory()
                .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?,
        };
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        info!("opened record store for {}.{table}", config.schema_name);
        Self::new(conn, &config.schema_name, table)
    }

    /// Look a record up by its identifier.
    pub fn find_by_id(&self, id: &str) -> Result<Record> {
        let table = self.qualified_table()?;
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!("SELECT * FROM {table} WHERE id = ?1"))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        query_records(&mut stmt, [id])?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::NotFound(format!("no data found at {} for id: {id}", self.table))
            })
    }

    /// Find every record matching all of the given field/value pairs.
    pub fn find_by_criteria(&self, criteria: &Record) -> Result<Vec<Record>> {
        if criteria.is_empty() {
            return Err(Error::Database("criteria cannot be empty".into()));
        }
        let table = self.qualified_table()?;

        let mut clauses = Vec::new();
        let mut values = Vec::new();
        for (i, (name, value)) in criteria.iter().enumerate() {
            if !is_valid_identifier(name) {
                return Err(Error::Database(format!("invalid column name: {name:?}")));
            }
            clauses.push(format!("{name} = ?{}", i + 1));
            values.push(json_to_sql(value)?);
        }

        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT * FROM {table} WHERE {} ORDER BY id",
                clauses.join(" AND ")
            ))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let records = query_records(&mut stmt, rusqlite::params_from_iter(values))?;
        if records.is_empty() {
            return Err(Error::NotFound(format!(
                "no data found for the following criteria: {}",
                Value::Object(criteria.clone())
            )));
        }
        Ok(records)
    }

    /// Insert one record, returning the generated identifier as a string.
    pub fn insert(&self, data: &Record) -> Result<String> {
        if data.is_empty() {
            return Err(Error::Database("cannot insert an empty record".into()));
        }
        let table = self.qualified_table()?;

        let mut columns = Vec::new();
        let mut placeholders = Vec::new();
        let mut values = Vec::new();
        for (i, (name, value)) in data.iter().enumerate() {
            if !is_valid_identifier(name) {
                return Err(Error::Database(format!("invalid column name: {name:?}")));
            }
            columns.push(name.as_str());
            placeholders.push(format!("?{}", i + 1));
            values.push(json_to_sql(value)?);
        }

        let conn = self.connection()?;
        conn.execute(
            &format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            ),
            rusqlite::params_from_iter(values),
        )
        .map_err(|e| Error::Database(format!("failed to insert into {}: {e}", self.table)))?;

        Ok(conn.last_insert_rowid().to_string())
    }

    /// List records ordered by identifier, with optional pagination.
    pub fn all(&self, limit: Option<u32>, skip: Option<u32>) -> Result<Vec<Record>> {
        let table = self.qualified_table()?;
        // LIMIT -1 means "no limit" to SQLite.
        let limit = limit.map_or(-1, i64::from);
        let skip = skip.map_or(0, i64::from);

        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT * FROM {table} ORDER BY id LIMIT ?1 OFFSET ?2"
            ))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        query_records(&mut stmt, rusqlite::params![limit, skip])
    }

    /// Project only the caller-chosen fields, ordered by identifier.
    pub fn summary(&self, fields: &[&str], limit: u32) -> Result<Vec<Record>> {
        if fields.is_empty() {
            return Err(Error::Database("summary requires at least one field".into()));
        }
        for field in fields {
            if !is_valid_identifier(field) {
                return Err(Error::Database(format!("invalid column name: {field:?}")));
            }
        }
        let table = self.qualified_table()?;

        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM {table} ORDER BY id LIMIT ?1",
                fields.join(", ")
            ))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        query_records(&mut stmt, [limit])
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("record store lock poisoned".into()))
    }

    fn qualified_table(&self) -> Result<String> {
        qualify(&self.schema, &self.table)
    }
}

/// Run a prepared statement and convert every row into a [`Record`].
fn query_records<P: rusqlite::Params>(stmt: &mut Statement<'_>, params: P) -> Result<Vec<Record>> {
    // Column metadata has to be captured before the borrow for query().
    let columns: Vec<(String, Option<String>)> = stmt
        .columns()
        .iter()
        .map(|c| {
            (
                c.name().to_string(),
                c.decl_type().map(|t| t.to_ascii_uppercase()),
            )
        })
        .collect();

    let mut rows = stmt
        .query(params)
        .map_err(|e| Error::Database(format!("query failed: {e}")))?;

    let mut records = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| Error::Database(format!("failed to read row: {e}")))?
    {
        let mut record = Record::new();
        for (i, (name, decl)) in columns.iter().enumerate() {
            let value = row
                .get_ref(i)
                .map_err(|e| Error::Database(format!("failed to read column {name}: {e}")))?;
            record.insert(name.clone(), column_to_json(name, decl.as_deref(), value)?);
        }
        records.push(record);
    }
    Ok(records)
}

fn column_to_json(name: &str, decl: Option<&str>, value: ValueRef<'_>) -> Result<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => {
            // Identifiers always travel as strings, whatever the storage type.
            if name == "id" {
                Value::String(n.to_string())
            } else {
                Value::from(n)
            }
        }
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            if decl == Some("TIMESTAMP") {
                Value::String(normalize_timestamp(&text))
            } else {
                Value::String(text)
            }
        }
        ValueRef::Blob(_) => {
            return Err(Error::Database(format!(
                "binary column {name} is not supported by the record adapter"
            )));
        }
    })
}

fn json_to_sql(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                return Err(Error::Database(format!("unrepresentable number: {n}")));
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        // Arrays and objects are stored as their JSON text.
        other => SqlValue::Text(other.to_string()),
    })
}

/// Render a stored timestamp in the adapter's fixed format, passing through
/// anything that does not parse.
fn normalize_timestamp(text: &str) -> String {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|_| text.to_string())
}
