//! Versioned schema migration engine.
//!
//! A database carries a single-row tracking table recording the highest
//! migration version applied to its schema. [`apply_migrations`] compares
//! that record against a catalog of [`Migration`] units and runs whatever is
//! outstanding, in ascending version order, pairing each unit with its
//! version update inside one transaction. [`run_migrations`] bootstraps a
//! database that has never been migrated.

use std::collections::HashSet;

use rusqlite::Connection;
use tracing::{debug, info};

use minipress_common::{Error, Result};

use crate::sql::qualify;

pub mod versions;

/// Name of the per-schema tracking table holding the single version row.
pub const VERSION_TABLE: &str = "schema_version";

/// One versioned unit of schema change.
///
/// Units are identified and ordered by [`version`](Migration::version); the
/// runner never relies on catalog position. [`down`](Migration::down) exists
/// for rollback tooling and is not invoked by the runner.
pub trait Migration {
    /// Non-negative version, unique within a catalog.
    fn version(&self) -> i64;

    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Apply the forward change against the given schema namespace.
    /// Must be safe to run exactly once per database lifetime.
    fn up(&self, conn: &Connection, schema: &str) -> Result<()>;

    /// Undo the forward change.
    fn down(&self, conn: &Connection, schema: &str) -> Result<()>;
}

/// Whether the tracking table exists in `schema`. Absence is the expected
/// fresh-database case, not an error.
pub fn has_version_table(conn: &Connection, schema: &str) -> Result<bool> {
    let master = qualify(schema, "sqlite_master")?;
    let count: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM {master} WHERE type = 'table' AND name = ?1"),
            [VERSION_TABLE],
            |row| row.get(0),
        )
        .map_err(|e| Error::Database(format!("failed to inspect schema {schema}: {e}")))?;
    Ok(count > 0)
}

/// Read the recorded version for `schema`.
///
/// Calling this on a database without a tracking table is a caller-ordering
/// bug (bootstrap first) and fails with [`Error::NotInitialized`]. Anything
/// other than exactly one row in the table is [`Error::Corruption`].
pub fn database_version(conn: &Connection, schema: &str) -> Result<i64> {
    if !has_version_table(conn, schema)? {
        return Err(Error::NotInitialized(format!(
            "no {VERSION_TABLE} table in schema {schema}; run the bootstrap first"
        )));
    }

    let table = qualify(schema, VERSION_TABLE)?;
    let mut stmt = conn
        .prepare(&format!("SELECT version FROM {table}"))
        .map_err(|e| Error::Database(format!("failed to prepare version query: {e}")))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, i64>(0))
        .map_err(|e| Error::Database(format!("failed to read version: {e}")))?;

    let mut versions = Vec::new();
    for row in rows {
        versions
            .push(row.map_err(|e| Error::Database(format!("failed to read version row: {e}")))?);
    }
    match versions.as_slice() {
        [version] => Ok(*version),
        [] => Err(Error::Corruption(format!("{table} holds no version row"))),
        more => Err(Error::Corruption(format!(
            "{table} holds {} version rows",
            more.len()
        ))),
    }
}

/// Overwrite the recorded version for `schema`. The single row is keyed on a
/// fixed primary key, so this is an upsert rather than a bare INSERT.
pub fn set_database_version(conn: &Connection, schema: &str, version: i64) -> Result<()> {
    let table = qualify(schema, VERSION_TABLE)?;
    conn.execute(
        &format!(
            "INSERT INTO {table} (id, version) VALUES (0, ?1)
             ON CONFLICT(id) DO UPDATE SET version = excluded.version"
        ),
        [version],
    )
    .map_err(|e| Error::Database(format!("failed to record version {version}: {e}")))?;
    Ok(())
}

/// Create the tracking table if it does not exist yet. The CHECK on the
/// primary key pins the table to its single designated row.
pub(crate) fn ensure_version_table(conn: &Connection, schema: &str) -> Result<()> {
    let table = qualify(schema, VERSION_TABLE)?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            version INTEGER NOT NULL
        );"
    ))
    .map_err(|e| Error::Database(format!("failed to create {table}: {e}")))?;
    Ok(())
}

/// Bring `schema` up to date with `catalog`.
///
/// On a fresh database this falls through to [`run_migrations`]. Otherwise
/// every unit with a version greater than the recorded one runs in ascending
/// version order, each inside its own transaction together with the version
/// update, so a failure leaves the recorded version at the last unit that
/// committed and no later unit is attempted.
pub fn apply_migrations(
    conn: &mut Connection,
    schema: &str,
    catalog: &[Box<dyn Migration>],
) -> Result<()> {
    validate_catalog(catalog)?;

    if !has_version_table(conn, schema)? {
        return run_migrations(catalog, conn, schema);
    }

    let current = database_version(conn, schema)?;
    let pending: Vec<&dyn Migration> = by_ascending_version(catalog)
        .into_iter()
        .filter(|unit| unit.version() > current)
        .collect();

    if pending.is_empty() {
        debug!("schema {schema} already at version {current}, nothing to apply");
        return Ok(());
    }

    for unit in pending {
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;
        unit.up(&tx, schema)?;
        set_database_version(&tx, schema, unit.version())?;
        tx.commit().map_err(|e| {
            Error::Database(format!("failed to commit migration {}: {e}", unit.version()))
        })?;
        info!(
            "applied migration {} ({}) to schema {schema}",
            unit.version(),
            unit.name()
        );
    }
    Ok(())
}

/// Bootstrap a database that has never been migrated: apply the full catalog
/// in ascending version order, then make sure a tracking table exists and
/// record the highest applied version (baseline 0 for an empty catalog).
pub fn run_migrations(
    catalog: &[Box<dyn Migration>],
    conn: &mut Connection,
    schema: &str,
) -> Result<()> {
    validate_catalog(catalog)?;

    let units = by_ascending_version(catalog);
    let target = units.last().map_or(0, |unit| unit.version());

    for unit in units {
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;
        unit.up(&tx, schema)?;
        tx.commit().map_err(|e| {
            Error::Database(format!("failed to commit migration {}: {e}", unit.version()))
        })?;
        info!(
            "applied migration {} ({}) to schema {schema}",
            unit.version(),
            unit.name()
        );
    }

    let tx = conn
        .transaction()
        .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;
    ensure_version_table(&tx, schema)?;
    set_database_version(&tx, schema, target)?;
    tx.commit()
        .map_err(|e| Error::Database(format!("failed to record bootstrap version: {e}")))?;

    info!("schema {schema} bootstrapped at version {target}");
    Ok(())
}

/// Reject catalogs the runner cannot order deterministically.
fn validate_catalog(catalog: &[Box<dyn Migration>]) -> Result<()> {
    let mut seen = HashSet::new();
    for unit in catalog {
        let version = unit.version();
        if version < 0 {
            return Err(Error::Migration(format!(
                "migration {} has negative version {version}",
                unit.name()
            )));
        }
        if !seen.insert(version) {
            return Err(Error::Migration(format!(
                "duplicate migration version {version} ({})",
                unit.name()
            )));
        }
    }
    Ok(())
}

fn by_ascending_version(catalog: &[Box<dyn Migration>]) -> Vec<&dyn Migration> {
    let mut units: Vec<&dyn Migration> = catalog.iter().map(AsRef::as_ref).collect();
    units.sort_by_key(|unit| unit.version());
    units
}
