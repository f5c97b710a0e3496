//! Storage layer for configuration variables.
//!
//! Every setting is one row of the `variables` table, keyed by name. Numbered
//! lists (`TO_NUMBER_<id>`, `IFTTT_MAKER_<id>`) are ordinary rows whose names
//! share a prefix; ids are never reused while a higher one exists.

pub mod migrations;
pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::variables::{self, NumberedEntry, NumberedList, Settings};

/// A stored variable with its last write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredVariable {
    /// Variable name.
    pub name: String,
    /// Raw value.
    pub value: String,
    /// Last write time.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Total number of variables stored.
    pub total_variables: i64,
    /// Number of destination phone numbers.
    pub destination_numbers: usize,
    /// Number of IFTTT makers.
    pub ifttt_makers: usize,
    /// Most recent write to any variable.
    pub last_updated: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Persistent store of configuration variables.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, name: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM variables WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Write one variable, replacing any previous value.
    ///
    /// The value is stored as given; use [`Storage::set_validated`] for user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r"
            INSERT INTO variables (name, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![name, value, now_string()],
        )?;
        debug!("Set variable {}", name);
        Ok(())
    }

    /// Validate a value against the variable's kind and store its canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVariable`] when the name or value is rejected.
    pub fn set_validated(&self, name: &str, raw: &str) -> Result<String> {
        let value =
            variables::normalize(name, raw).map_err(|message| Error::invalid_variable(name, message))?;
        self.set(name, &value)?;
        Ok(value)
    }

    /// Remove one variable.
    ///
    /// Returns `true` if a variable was removed, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM variables WHERE name = ?1", [name])?;
        Ok(affected > 0)
    }

    /// All variables ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self) -> Result<Vec<StoredVariable>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, value, updated_at FROM variables ORDER BY name")?;
        let rows = stmt
            .query_map([], |row| {
                let updated_at: Option<String> = row.get(2)?;
                Ok(StoredVariable {
                    name: row.get(0)?,
                    value: row.get(1)?,
                    updated_at: updated_at.as_deref().and_then(parse_time),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Entries of a numbered list ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_numbered(&self, list: NumberedList) -> Result<Vec<NumberedEntry>> {
        let pattern = format!("{}[0-9]*", list.prefix());
        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM variables WHERE name GLOB ?1")?;
        let rows = stmt
            .query_map([pattern], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut entries: Vec<NumberedEntry> = rows
            .into_iter()
            .filter_map(|(name, value)| match NumberedList::parse_key(&name) {
                Some((found, id)) if found == list => Some(NumberedEntry { id, value }),
                _ => None,
            })
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    /// The id a new entry of the list would get: highest id plus one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn next_numbered_id(&self, list: NumberedList) -> Result<u32> {
        let max = self.list_numbered(list)?.last().map_or(0, |e| e.id);
        max.checked_add(1)
            .ok_or_else(|| Error::internal(format!("{} ids exhausted", list.prefix())))
    }

    /// Append an entry to a numbered list and return its id.
    ///
    /// The value is stored as given; callers validate it first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn add_numbered(&self, list: NumberedList, value: &str) -> Result<u32> {
        let id = self.next_numbered_id(list)?;
        self.set(&list.key(id), value)?;
        Ok(id)
    }

    /// Remove one entry of a numbered list. Other entries keep their ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove_numbered(&self, list: NumberedList, id: u32) -> Result<bool> {
        let removed = self.remove(&list.key(id))?;
        if removed {
            info!("Removed {}", list.key(id));
        }
        Ok(removed)
    }

    /// Insert the given values where no variable of that name exists yet.
    ///
    /// Returns how many variables were created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn seed(&self, values: &BTreeMap<String, String>) -> Result<usize> {
        let mut inserted = 0;
        for (name, value) in values {
            inserted += self.conn.execute(
                "INSERT OR IGNORE INTO variables (name, value, updated_at) VALUES (?1, ?2, ?3)",
                params![name, value, now_string()],
            )?;
        }
        if inserted > 0 {
            info!("Seeded {} variables", inserted);
        }
        Ok(inserted)
    }

    /// A typed snapshot of every variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn settings(&self) -> Result<Settings> {
        let mut stmt = self.conn.prepare("SELECT name, value FROM variables")?;
        let values = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<BTreeMap<String, String>, _>>()?;
        Ok(Settings::from_values(values))
    }

    /// Count stored variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM variables", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StoreStats> {
        let total_variables = self.count()?;
        let newest: Option<String> = self
            .conn
            .query_row("SELECT MAX(updated_at) FROM variables", [], |row| row.get(0))?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map_or(0, |m| m.len())
        };

        Ok(StoreStats {
            total_variables,
            destination_numbers: self.list_numbered(NumberedList::DestinationNumbers)?.len(),
            ifttt_makers: self.list_numbered(NumberedList::IftttMakers)?.len(),
            last_updated: newest.as_deref().and_then(parse_time),
            db_size_bytes,
        })
    }
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    #[test]
    fn test_set_and_get() {
        let storage = create_test_storage();
        storage.set("NIGHTSCOUT_LINK", "https://ns.example.com").unwrap();
        assert_eq!(
            storage.get("NIGHTSCOUT_LINK").unwrap().as_deref(),
            Some("https://ns.example.com")
        );
        assert!(storage.get("MISSING").unwrap().is_none());
    }

    #[test]
    fn test_set_overwrites() {
        let storage = create_test_storage();
        storage.set("SEND_SMS", "true").unwrap();
        storage.set("SEND_SMS", "false").unwrap();
        assert_eq!(storage.get("SEND_SMS").unwrap().as_deref(), Some("false"));
        assert_eq!(storage.count().unwrap(), 1);
    }

    #[test]
    fn test_set_leaves_others_unchanged() {
        let storage = create_test_storage();
        storage.set("A_VAR", "1").unwrap();
        storage.set("B_VAR", "2").unwrap();
        storage.set("A_VAR", "3").unwrap();
        assert_eq!(storage.get("B_VAR").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_set_validated() {
        let storage = create_test_storage();
        let stored = storage.set_validated("FROM_NUMBER", "+48 100 000 000").unwrap();
        assert_eq!(stored, "+48100000000");

        let err = storage.set_validated("SEND_SMS", "perhaps").unwrap_err();
        assert!(matches!(err, Error::InvalidVariable { .. }));

        let err = storage.set_validated("TO_NUMBER_01", "+48100000002").unwrap_err();
        assert!(matches!(err, Error::InvalidVariable { .. }));
        assert_eq!(storage.get("TO_NUMBER_01").unwrap(), None);
        assert!(storage.get("SEND_SMS").unwrap().is_none());
    }

    #[test]
    fn test_zero_padded_key_is_not_a_list_entry() {
        let storage = create_test_storage();
        storage.set("TO_NUMBER_1", "+48100000001").unwrap();
        storage.set("TO_NUMBER_01", "+48100000002").unwrap();

        let entries = storage.list_numbered(NumberedList::DestinationNumbers).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, "+48100000001");

        assert!(storage
            .remove_numbered(NumberedList::DestinationNumbers, 1)
            .unwrap());
        assert!(storage
            .list_numbered(NumberedList::DestinationNumbers)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_remove() {
        let storage = create_test_storage();
        storage.set("X_VAR", "1").unwrap();
        assert!(storage.remove("X_VAR").unwrap());
        assert!(!storage.remove("X_VAR").unwrap());
    }

    #[test]
    fn test_numbered_ids_are_stable() {
        let storage = create_test_storage();
        let list = NumberedList::DestinationNumbers;
        assert_eq!(storage.add_numbered(list, "+48100000001").unwrap(), 1);
        assert_eq!(storage.add_numbered(list, "+48100000002").unwrap(), 2);
        assert_eq!(storage.add_numbered(list, "+48100000003").unwrap(), 3);

        assert!(storage.remove_numbered(list, 1).unwrap());
        let ids: Vec<u32> = storage.list_numbered(list).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);

        assert_eq!(storage.add_numbered(list, "+48100000004").unwrap(), 4);
    }

    #[test]
    fn test_numbered_orders_numerically() {
        let storage = create_test_storage();
        storage.set("IFTTT_MAKER_10", "ten").unwrap();
        storage.set("IFTTT_MAKER_9", "nine").unwrap();
        storage.set("IFTTT_MAKER_X", "ignored").unwrap();
        storage.set("TO_NUMBER_1", "+48100000000").unwrap();

        let values: Vec<String> = storage
            .list_numbered(NumberedList::IftttMakers)
            .unwrap()
            .into_iter()
            .map(|e| e.value)
            .collect();
        assert_eq!(values, vec!["nine", "ten"]);
    }

    #[test]
    fn test_next_numbered_id_empty() {
        let storage = create_test_storage();
        assert_eq!(storage.next_numbered_id(NumberedList::IftttMakers).unwrap(), 1);
    }

    #[test]
    fn test_remove_numbered_missing() {
        let storage = create_test_storage();
        assert!(!storage.remove_numbered(NumberedList::IftttMakers, 7).unwrap());
    }

    #[test]
    fn test_seed_does_not_overwrite() {
        let storage = create_test_storage();
        storage.set("SEND_SMS", "true").unwrap();

        let mut seed = BTreeMap::new();
        seed.insert("SEND_SMS".to_string(), "false".to_string());
        seed.insert("TRIGGER_IFTTT".to_string(), "false".to_string());

        assert_eq!(storage.seed(&seed).unwrap(), 1);
        assert_eq!(storage.get("SEND_SMS").unwrap().as_deref(), Some("true"));
        assert_eq!(storage.seed(&seed).unwrap(), 0);
    }

    #[test]
    fn test_settings_snapshot() {
        let storage = create_test_storage();
        storage.set("SEND_SMS", "true").unwrap();
        storage.set("TO_NUMBER_2", "+48100000000").unwrap();

        let settings = storage.settings().unwrap();
        assert!(settings.send_sms());
        assert_eq!(
            settings.list_values(NumberedList::DestinationNumbers),
            vec!["+48100000000"]
        );
    }

    #[test]
    fn test_list_has_timestamps() {
        let storage = create_test_storage();
        storage.set("B_VAR", "2").unwrap();
        storage.set("A_VAR", "1").unwrap();

        let all = storage.list().unwrap();
        assert_eq!(all[0].name, "A_VAR");
        assert!(all.iter().all(|v| v.updated_at.is_some()));
    }

    #[test]
    fn test_stats() {
        let storage = create_test_storage();
        let empty = storage.stats().unwrap();
        assert_eq!(empty.total_variables, 0);
        assert!(empty.last_updated.is_none());

        storage.set("TO_NUMBER_1", "+48100000000").unwrap();
        storage.set("IFTTT_MAKER_1", "key").unwrap();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_variables, 2);
        assert_eq!(stats.destination_numbers, 1);
        assert_eq!(stats.ifttt_makers, 1);
        assert!(stats.last_updated.is_some());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("reminder.db");
        {
            let storage = Storage::open(&path).unwrap();
            storage.set("SEND_SMS", "true").unwrap();
        }
        let reopened = Storage::open(&path).unwrap();
        assert_eq!(reopened.get("SEND_SMS").unwrap().as_deref(), Some("true"));
        assert_eq!(reopened.path(), path.as_path());
    }
}
