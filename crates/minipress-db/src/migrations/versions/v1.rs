use rusqlite::Connection;

use minipress_common::{Error, Result};

use crate::migrations::Migration;
use crate::sql::qualify;

/// Version 1: create the posts table served by the record adapter.
pub struct CreatePosts;

impl Migration for CreatePosts {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &'static str {
        "create_posts"
    }

    fn up(&self, conn: &Connection, schema: &str) -> Result<()> {
        let posts = qualify(schema, "posts")?;
        conn.execute_batch(&format!(
            "CREATE TABLE {posts} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                body TEXT NOT NULL,
                timestamp TIMESTAMP NOT NULL
            );"
        ))
        .map_err(|e| Error::Database(format!("failed to create {posts}: {e}")))?;
        Ok(())
    }

    fn down(&self, conn: &Connection, schema: &str) -> Result<()> {
        let posts = qualify(schema, "posts")?;
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {posts};"))
            .map_err(|e| Error::Database(format!("failed to drop {posts}: {e}")))?;
        Ok(())
    }
}
