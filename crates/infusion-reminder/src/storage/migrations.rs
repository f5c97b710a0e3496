//! Schema versioning for the variable store.
//!
//! The version lives in `metadata` under `schema_version`. A fresh database
//! gets the full schema from [`SCHEMA_STATEMENTS`] and then every entry of
//! [`MIGRATIONS`] in order, each in its own transaction.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// Metadata key holding the schema version.
const VERSION_KEY: &str = "schema_version";

/// Ordered migrations: target version and the SQL that reaches it.
const MIGRATIONS: &[(i32, &str)] = &[
    // Base schema, created by SCHEMA_STATEMENTS.
    (1, ""),
    // Stores written by older panels hold `True`/`False` and `1`/`0` switches.
    (
        2,
        r"
UPDATE variables
SET value = CASE WHEN lower(value) IN ('true', '1', 'yes', 'on') THEN 'true' ELSE 'false' END
WHERE name IN ('SEND_SMS', 'TRIGGER_IFTTT')
  AND value NOT IN ('true', 'false')
",
    ),
];

/// The version a fully migrated store has.
pub const CURRENT_VERSION: i32 = 2;

/// Create missing tables and apply pending migrations.
///
/// # Errors
///
/// Returns an error if the store was written by a newer version or a
/// migration fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "store schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for &(target, sql) in MIGRATIONS.iter().filter(|(target, _)| *target > version) {
        apply(conn, target, sql)?;
    }
    Ok(())
}

/// Read the schema version; 0 when none is recorded.
///
/// # Errors
///
/// Returns an error if the stored version is not a number.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    match conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get::<_, String>(0),
    ) {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn apply(conn: &Connection, target: i32, sql: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    if !sql.trim().is_empty() {
        tx.execute_batch(sql).map_err(|e| Error::DatabaseMigration {
            message: format!("migration to version {target} failed: {e}"),
        })?;
    }
    tx.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, target.to_string()),
    )?;
    tx.commit()?;
    info!("Store schema migrated to version {}", target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn tables(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_fresh_store_is_fully_migrated() {
        let conn = memory();
        initialize_schema(&conn).unwrap();

        assert_eq!(tables(&conn), vec!["metadata", "variables"]);
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
        assert_eq!(MIGRATIONS.last().map(|(v, _)| *v), Some(CURRENT_VERSION));
    }

    #[test]
    fn test_initialize_twice() {
        let conn = memory();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_legacy_switches_normalized() {
        let conn = memory();
        for statement in SCHEMA_STATEMENTS {
            conn.execute(statement, []).unwrap();
        }
        conn.execute_batch(
            "INSERT INTO metadata (key, value) VALUES ('schema_version', '1');
             INSERT INTO variables (name, value) VALUES ('SEND_SMS', 'True');
             INSERT INTO variables (name, value) VALUES ('TRIGGER_IFTTT', '0');
             INSERT INTO variables (name, value) VALUES ('FROM_NUMBER', 'True');",
        )
        .unwrap();

        initialize_schema(&conn).unwrap();

        let value = |name: &str| -> String {
            conn.query_row("SELECT value FROM variables WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .unwrap()
        };
        assert_eq!(value("SEND_SMS"), "true");
        assert_eq!(value("TRIGGER_IFTTT"), "false");
        assert_eq!(value("FROM_NUMBER"), "True");
    }

    #[test]
    fn test_newer_store_rejected() {
        let conn = memory();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "UPDATE metadata SET value = ?1 WHERE key = 'schema_version'",
            [(CURRENT_VERSION + 1).to_string()],
        )
        .unwrap();

        let err = initialize_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_garbage_version_rejected() {
        let conn = memory();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "UPDATE metadata SET value = 'two' WHERE key = 'schema_version'",
            [],
        )
        .unwrap();

        assert!(schema_version(&conn).is_err());
    }
}
