use rusqlite::Connection;

use minipress_common::{Error, Result};

use crate::migrations::{Migration, VERSION_TABLE, ensure_version_table};
use crate::sql::qualify;

/// Version 0: create the tracking table and its baseline row, so even a
/// database migrated from an empty baseline carries a version record.
pub struct CreateVersionTable;

impl Migration for CreateVersionTable {
    fn version(&self) -> i64 {
        0
    }

    fn name(&self) -> &'static str {
        "create_version_table"
    }

    fn up(&self, conn: &Connection, schema: &str) -> Result<()> {
        ensure_version_table(conn, schema)?;
        let table = qualify(schema, VERSION_TABLE)?;
        // Baseline row; later units overwrite the version, never add rows.
        conn.execute(
            &format!("INSERT OR IGNORE INTO {table} (id, version) VALUES (0, 0)"),
            [],
        )
        .map_err(|e| Error::Database(format!("failed to seed {table}: {e}")))?;
        Ok(())
    }

    fn down(&self, conn: &Connection, schema: &str) -> Result<()> {
        let table = qualify(schema, VERSION_TABLE)?;
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))
            .map_err(|e| Error::Database(format!("failed to drop {table}: {e}")))?;
        Ok(())
    }
}
