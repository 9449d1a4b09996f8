//! Persistent registry of conferences: name <-> id plus usage timestamps.

use std::fmt;

use time::OffsetDateTime;

mod sqlite;

pub use sqlite::SqliteRegistry;

/// One row of the registry. `id` and `name` never change after insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConferenceEntry {
    pub id: u64,
    pub name: String,
    pub created: OffsetDateTime,
    pub last_used: OffsetDateTime,
}

/// Unique column hit by a rejected insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Name,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Id => f.write_str("id"),
            Column::Name => f.write_str("name"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("conference {0} already registered")]
    Conflict(Column),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Durable unique-key table behind the resolver.
///
/// Lookups return `Ok(None)` on a miss. Calls block on storage; async
/// callers go through `spawn_blocking`.
pub trait Registry: Send + Sync {
    fn find_id_by_name(&self, name: &str) -> Result<Option<u64>, RegistryError>;

    fn find_name_by_id(&self, id: u64) -> Result<Option<String>, RegistryError>;

    /// Insert a new entry, failing with [`RegistryError::Conflict`] when the
    /// name or the id is already taken.
    fn insert(&self, name: &str, id: u64) -> Result<(), RegistryError>;

    /// Mark `id` as used now. Returns `false` when no such entry exists.
    fn touch(&self, id: u64) -> Result<bool, RegistryError>;

    /// Remove every entry last used before `threshold`; returns how many.
    fn delete_older_than(&self, threshold: OffsetDateTime) -> Result<usize, RegistryError>;
}
