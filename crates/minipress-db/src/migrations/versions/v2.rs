use rusqlite::Connection;

use minipress_common::{Error, Result};

use crate::migrations::Migration;
use crate::sql::qualify;

/// Version 2: create the users table backing authentication.
pub struct CreateUsers;

impl Migration for CreateUsers {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &'static str {
        "create_users"
    }

    fn up(&self, conn: &Connection, schema: &str) -> Result<()> {
        let users = qualify(schema, "users")?;
        conn.execute_batch(&format!(
            "CREATE TABLE {users} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                encrypted_password TEXT NOT NULL
            );"
        ))
        .map_err(|e| Error::Database(format!("failed to create {users}: {e}")))?;
        Ok(())
    }

    fn down(&self, conn: &Connection, schema: &str) -> Result<()> {
        let users = qualify(schema, "users")?;
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {users};"))
            .map_err(|e| Error::Database(format!("failed to drop {users}: {e}")))?;
        Ok(())
    }
}
