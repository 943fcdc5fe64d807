//! Key/value storage port and its implementations.
//!
//! # Responsibility
//! - Provide get/set/remove by logical key plus key enumeration.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Keys are non-blank; values are opaque UTF-8 strings.
//! - `keys()` returns keys in ascending order.

use crate::db::DbError;
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage port error.
#[derive(Debug)]
pub enum StoreError {
    InvalidKey(String),
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKey(key) => write!(f, "storage key is invalid: `{key}`"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidKey(_) => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable key/value storage used for the persisted client record.
pub trait StateStorage {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;
    fn remove_item(&self, key: &str) -> StoreResult<()>;
    /// Enumerates every stored key, including ones written by other clients.
    fn keys(&self) -> StoreResult<Vec<String>>;
}

impl<T: StateStorage + ?Sized> StateStorage for &T {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        (**self).remove_item(key)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        (**self).keys()
    }
}

impl<T: StateStorage + ?Sized> StateStorage for Rc<T> {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        (**self).remove_item(key)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        (**self).keys()
    }
}

/// In-process storage, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    items: RefCell<BTreeMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStateStore {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        let key = normalize_key(key)?;
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        let key = normalize_key(key)?;
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        let key = normalize_key(key)?;
        self.items.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.items.borrow().keys().cloned().collect())
    }
}

/// SQLite-backed storage over the `kv_store` table.
///
/// The connection must come from `db::open_db` or `db::open_db_in_memory`.
pub struct SqliteStateStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStateStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl StateStorage for SqliteStateStore<'_> {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        let key = normalize_key(key)?;
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        let key = normalize_key(key)?;
        self.conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        let key = normalize_key(key)?;
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1;", [key])?;
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv_store ORDER BY key ASC;")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

fn normalize_key(key: &str) -> StoreResult<&str> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::{MemoryStateStore, SqliteStateStore, StateStorage, StoreError};
    use crate::db::open_db_in_memory;

    fn exercise(store: &dyn StateStorage) {
        assert_eq!(store.get_item("event-a").expect("get"), None);
        store.set_item("event-b", "2").expect("set b");
        store.set_item("event-a", "1").expect("set a");
        store.set_item("event-a", "3").expect("overwrite a");

        assert_eq!(store.get_item("event-a").expect("get").as_deref(), Some("3"));
        assert_eq!(store.keys().expect("keys"), vec!["event-a", "event-b"]);

        store.remove_item("event-a").expect("remove");
        store.remove_item("missing").expect("removing a missing key is fine");
        assert_eq!(store.keys().expect("keys"), vec!["event-b"]);
    }

    #[test]
    fn memory_store_roundtrip() {
        exercise(&MemoryStateStore::new());
    }

    #[test]
    fn sqlite_store_roundtrip() {
        let conn = open_db_in_memory().expect("open in-memory store");
        exercise(&SqliteStateStore::new(&conn));
    }

    #[test]
    fn blank_keys_are_rejected() {
        let store = MemoryStateStore::new();
        let err = store.set_item("   ", "x").expect_err("blank key must fail");
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[test]
    fn keys_are_trimmed() {
        let store = MemoryStateStore::new();
        store.set_item(" default ", "x").expect("set");
        assert_eq!(store.get_item("default").expect("get").as_deref(), Some("x"));
    }
}
