use rusqlite::Connection;

use minipress_common::{Error, Result};
use minipress_db::migrations::{
    Migration, apply_migrations, database_version, has_version_table, run_migrations, versions,
};

const SCHEMA: &str = "main";

/// Test unit that creates one single-column table.
struct CreateTable {
    version: i64,
    table: &'static str,
}

impl Migration for CreateTable {
    fn version(&self) -> i64 {
        self.version
    }

    fn name(&self) -> &'static str {
        self.table
    }

    fn up(&self, conn: &Connection, schema: &str) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE {schema}.{} (just_a_column INTEGER);",
            self.table
        ))
        .map_err(|e| Error::Database(e.to_string()))
    }

    fn down(&self, conn: &Connection, schema: &str) -> Result<()> {
        conn.execute_batch(&format!("DROP TABLE {schema}.{};", self.table))
            .map_err(|e| Error::Database(e.to_string()))
    }
}

/// Test unit whose apply step always fails.
struct Failing {
    version: i64,
}

impl Migration for Failing {
    fn version(&self) -> i64 {
        self.version
    }

    fn name(&self) -> &'static str {
        "failing"
    }

    fn up(&self, _conn: &Connection, _schema: &str) -> Result<()> {
        Err(Error::Migration("intentional failure".into()))
    }

    fn down(&self, _conn: &Connection, _schema: &str) -> Result<()> {
        Ok(())
    }
}

fn unit(version: i64, table: &'static str) -> Box<dyn Migration> {
    Box::new(CreateTable { version, table })
}

fn fresh_database() -> Connection {
    Connection::open_in_memory().unwrap()
}

/// Mirror of a database that was version-tracked before any of the test
/// catalog's tables existed.
fn database_at_version(version: i64) -> Connection {
    let conn = fresh_database();
    conn.execute_batch(
        "CREATE TABLE schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            version INTEGER NOT NULL
        );",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO schema_version (id, version) VALUES (0, ?1)",
        [version],
    )
    .unwrap();
    conn
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .unwrap();
    count > 0
}

#[test]
fn bootstrap_applies_full_catalog_and_installs_tracking_table() {
    let mut conn = fresh_database();
    let catalog = vec![unit(0, "first_table"), unit(1, "second_table")];

    run_migrations(&catalog, &mut conn, SCHEMA).unwrap();

    assert!(table_exists(&conn, "first_table"));
    assert!(table_exists(&conn, "second_table"));
    assert!(has_version_table(&conn, SCHEMA).unwrap());
    assert_eq!(database_version(&conn, SCHEMA).unwrap(), 1);
}

#[test]
fn bootstrap_with_empty_catalog_still_creates_tracking_table() {
    let mut conn = fresh_database();

    run_migrations(&[], &mut conn, SCHEMA).unwrap();

    assert!(has_version_table(&conn, SCHEMA).unwrap());
    assert_eq!(database_version(&conn, SCHEMA).unwrap(), 0);
}

#[test]
fn bootstrap_single_unit_scenario() {
    // Catalog [V0 creates table T], fresh database: T exists, version == 0.
    let mut conn = fresh_database();

    run_migrations(&[unit(0, "t")], &mut conn, SCHEMA).unwrap();

    assert!(table_exists(&conn, "t"));
    assert_eq!(database_version(&conn, SCHEMA).unwrap(), 0);
}

#[test]
fn apply_on_fresh_database_falls_back_to_bootstrap() {
    let mut conn = fresh_database();
    let catalog = vec![unit(0, "first_table"), unit(1, "second_table")];

    apply_migrations(&mut conn, SCHEMA, &catalog).unwrap();

    assert!(table_exists(&conn, "first_table"));
    assert!(table_exists(&conn, "second_table"));
    assert_eq!(database_version(&conn, SCHEMA).unwrap(), 1);
}

#[test]
fn apply_skips_units_at_or_below_the_recorded_version() {
    // Database already tracked at version 0: the version-0 unit must not
    // run again, only the version-1 unit.
    let mut conn = database_at_version(0);
    let catalog = vec![unit(0, "first_table"), unit(1, "second_table")];

    apply_migrations(&mut conn, SCHEMA, &catalog).unwrap();

    assert!(!table_exists(&conn, "first_table"));
    assert!(table_exists(&conn, "second_table"));
    assert_eq!(database_version(&conn, SCHEMA).unwrap(), 1);
}

#[test]
fn apply_with_nothing_pending_is_a_no_op() {
    let mut conn = database_at_version(5);
    let catalog = vec![unit(0, "first_table")];

    apply_migrations(&mut conn, SCHEMA, &catalog).unwrap();

    assert!(!table_exists(&conn, "first_table"));
    assert_eq!(database_version(&conn, SCHEMA).unwrap(), 5);
}

#[test]
fn apply_twice_is_idempotent() {
    let mut conn = database_at_version(0);
    let catalog = vec![unit(1, "first_table"), unit(2, "second_table")];

    apply_migrations(&mut conn, SCHEMA, &catalog).unwrap();
    // The units create tables without IF NOT EXISTS, so any re-execution
    // on the second call would fail loudly.
    apply_migrations(&mut conn, SCHEMA, &catalog).unwrap();

    assert_eq!(database_version(&conn, SCHEMA).unwrap(), 2);
}

#[test]
fn apply_runs_units_in_version_order_not_catalog_order() {
    let mut conn = database_at_version(0);
    // The version-2 unit only works if the version-1 unit ran before it.
    let dependent: Box<dyn Migration> = Box::new(DependsOnFirst);
    let catalog = vec![dependent, unit(1, "first_table")];

    apply_migrations(&mut conn, SCHEMA, &catalog).unwrap();

    assert!(table_exists(&conn, "first_table"));
    assert!(table_exists(&conn, "copy_of_first"));
    assert_eq!(database_version(&conn, SCHEMA).unwrap(), 2);
}

/// Version 2 unit that reads the table created by version 1.
struct DependsOnFirst;

impl Migration for DependsOnFirst {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &'static str {
        "depends_on_first"
    }

    fn up(&self, conn: &Connection, schema: &str) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE {schema}.copy_of_first AS SELECT * FROM {schema}.first_table;"
        ))
        .map_err(|e| Error::Database(e.to_string()))
    }

    fn down(&self, conn: &Connection, schema: &str) -> Result<()> {
        conn.execute_batch(&format!("DROP TABLE {schema}.copy_of_first;"))
            .map_err(|e| Error::Database(e.to_string()))
    }
}

#[test]
fn failed_unit_halts_the_batch_and_keeps_partial_progress() {
    let mut conn = database_at_version(0);
    let catalog = vec![
        unit(1, "first_table"),
        Box::new(Failing { version: 2 }) as Box<dyn Migration>,
        unit(3, "third_table"),
    ];

    let err = apply_migrations(&mut conn, SCHEMA, &catalog).unwrap_err();
    assert!(matches!(err, Error::Migration(_)));

    // Version stops at the last committed unit; later units never ran.
    assert_eq!(database_version(&conn, SCHEMA).unwrap(), 1);
    assert!(table_exists(&conn, "first_table"));
    assert!(!table_exists(&conn, "third_table"));
}

#[test]
fn resuming_after_a_fixed_failure_picks_up_where_it_stopped() {
    let mut conn = database_at_version(0);
    let failing = vec![
        unit(1, "first_table"),
        Box::new(Failing { version: 2 }) as Box<dyn Migration>,
    ];
    apply_migrations(&mut conn, SCHEMA, &failing).unwrap_err();

    let fixed = vec![unit(1, "first_table"), unit(2, "second_table")];
    apply_migrations(&mut conn, SCHEMA, &fixed).unwrap();

    assert!(table_exists(&conn, "second_table"));
    assert_eq!(database_version(&conn, SCHEMA).unwrap(), 2);
}

#[test]
fn duplicate_versions_are_rejected_before_anything_runs() {
    let mut conn = fresh_database();
    let catalog = vec![unit(1, "first_table"), unit(1, "second_table")];

    let err = apply_migrations(&mut conn, SCHEMA, &catalog).unwrap_err();
    assert!(matches!(err, Error::Migration(_)));

    assert!(!table_exists(&conn, "first_table"));
    assert!(!table_exists(&conn, "second_table"));
    assert!(!has_version_table(&conn, SCHEMA).unwrap());
}

#[test]
fn tampered_tracking_table_reads_as_corruption() {
    let conn = database_at_version(3);
    conn.execute("DELETE FROM schema_version", []).unwrap();

    let err = database_version(&conn, SCHEMA).unwrap_err();
    assert!(matches!(err, Error::Corruption(_)));
}

#[test]
fn multi_row_tracking_table_reads_as_corruption() {
    let conn = fresh_database();
    // A tracking table from before the fixed-primary-key shape.
    conn.execute_batch(
        "CREATE TABLE schema_version (id INTEGER, version INTEGER NOT NULL);
         INSERT INTO schema_version (id, version) VALUES (0, 1);
         INSERT INTO schema_version (id, version) VALUES (1, 2);",
    )
    .unwrap();

    let err = database_version(&conn, SCHEMA).unwrap_err();
    assert!(matches!(err, Error::Corruption(_)));
}

#[test]
fn builtin_catalog_bootstraps_the_application_schema() {
    let mut conn = fresh_database();

    run_migrations(&versions::catalog(), &mut conn, SCHEMA).unwrap();

    assert!(table_exists(&conn, "schema_version"));
    assert!(table_exists(&conn, "posts"));
    assert!(table_exists(&conn, "users"));
    assert_eq!(database_version(&conn, SCHEMA).unwrap(), 2);
}

#[test]
fn builtin_catalog_is_a_no_op_once_applied() {
    let mut conn = fresh_database();
    let catalog = versions::catalog();

    run_migrations(&catalog, &mut conn, SCHEMA).unwrap();
    apply_migrations(&mut conn, SCHEMA, &catalog).unwrap();

    assert_eq!(database_version(&conn, SCHEMA).unwrap(), 2);
}
