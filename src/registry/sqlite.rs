//! SQLite-backed registry.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, types::Type, Connection, ErrorCode, OptionalExtension};
use time::OffsetDateTime;

use super::{Column, ConferenceEntry, Registry, RegistryError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conferences (
    "conferenceId" INTEGER NOT NULL PRIMARY KEY,
    "conferenceName" TEXT NOT NULL UNIQUE,
    "created" INTEGER NOT NULL DEFAULT (strftime('%s','now')),
    "lastUsed" INTEGER NOT NULL DEFAULT (strftime('%s','now'))
)"#;

/// Single-table registry on one SQLite connection.
///
/// The connection is serialized behind a mutex; uniqueness is left to the
/// table constraints.
pub struct SqliteRegistry {
    conn: Mutex<Connection>,
}

impl SqliteRegistry {
    /// Open (or create) the database at `path` and make sure the table exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, RegistryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RegistryError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Set `lastUsed` of `id` to `at`. Returns `false` for unknown ids.
    pub fn touch_at(&self, id: u64, at: OffsetDateTime) -> Result<bool, RegistryError> {
        let Some(id) = sql_id(id) else { return Ok(false) };
        let updated = self.conn.lock().execute(
            "UPDATE conferences SET lastUsed = ?1 WHERE conferenceId = ?2",
            params![at.unix_timestamp(), id],
        )?;
        tracing::debug!(id, updated, "touched conference");
        Ok(updated > 0)
    }

    /// Full row for `id`, timestamps included.
    pub fn entry(&self, id: u64) -> Result<Option<ConferenceEntry>, RegistryError> {
        let Some(sql) = sql_id(id) else { return Ok(None) };
        let entry = self
            .conn
            .lock()
            .query_row(
                "SELECT conferenceName, created, lastUsed FROM conferences WHERE conferenceId = ?1",
                params![sql],
                |row| {
                    Ok(ConferenceEntry {
                        id,
                        name: row.get(0)?,
                        created: timestamp(row.get(1)?, 1)?,
                        last_used: timestamp(row.get(2)?, 2)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    pub fn len(&self) -> Result<usize, RegistryError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM conferences", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.len()? == 0)
    }
}

impl Registry for SqliteRegistry {
    fn find_id_by_name(&self, name: &str) -> Result<Option<u64>, RegistryError> {
        let id: Option<i64> = self
            .conn
            .lock()
            .query_row(
                "SELECT conferenceId FROM conferences WHERE conferenceName = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        tracing::debug!(conference = %name, ?id, "looked up conference id");
        match id.map(u64::try_from) {
            None => Ok(None),
            Some(Ok(id)) => Ok(Some(id)),
            Some(Err(_)) => {
                tracing::warn!(
                    conference = %name,
                    ?id,
                    "stored conference id is negative, ignoring"
                );
                Ok(None)
            }
        }
    }

    fn find_name_by_id(&self, id: u64) -> Result<Option<String>, RegistryError> {
        let Some(sql) = sql_id(id) else { return Ok(None) };
        let name: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT conferenceName FROM conferences WHERE conferenceId = ?1",
                params![sql],
                |row| row.get(0),
            )
            .optional()?;
        tracing::debug!(id, conference = ?name, "looked up conference name");
        Ok(name)
    }

    fn insert(&self, name: &str, id: u64) -> Result<(), RegistryError> {
        let Some(sql) = sql_id(id) else { return Err(RegistryError::Conflict(Column::Id)) };
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.conn
            .lock()
            .execute(
                "INSERT INTO conferences (conferenceName, conferenceId, created, lastUsed) \
                 VALUES (?1, ?2, ?3, ?3)",
                params![name, sql, now],
            )
            .map_err(constraint_conflict)?;
        tracing::debug!(conference = %name, id, "inserted conference");
        Ok(())
    }

    fn touch(&self, id: u64) -> Result<bool, RegistryError> {
        self.touch_at(id, OffsetDateTime::now_utc())
    }

    fn delete_older_than(&self, threshold: OffsetDateTime) -> Result<usize, RegistryError> {
        let removed = self.conn.lock().execute(
            "DELETE FROM conferences WHERE lastUsed < ?1",
            params![threshold.unix_timestamp()],
        )?;
        Ok(removed)
    }
}

// Ids above i64::MAX cannot be stored, so they can never match a row.
fn sql_id(id: u64) -> Option<i64> {
    i64::try_from(id).ok()
}

fn timestamp(secs: i64, column: usize) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(column, Type::Integer, Box::new(err))
        })
}

fn constraint_conflict(err: rusqlite::Error) -> RegistryError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            let on_name = message.as_deref().is_some_and(|m| m.contains("conferenceName"));
            return RegistryError::Conflict(if on_name { Column::Name } else { Column::Id });
        }
    }
    RegistryError::Storage(err)
}
