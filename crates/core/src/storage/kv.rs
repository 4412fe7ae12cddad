//! Key/value document persistence.
//!
//! The quote history is stored as one JSON document under a single key, so
//! the surface only needs whole-value reads and writes.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_rusqlite::{params, rusqlite};

use super::connection::LocalDb;
use crate::Error;

/// Durable key/value store holding serialized documents.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the document stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Replace the document stored under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;
}

#[async_trait]
impl KeyValueStore for LocalDb {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row("SELECT value FROM kv_store WHERE key = ?1", params![key], |row| row.get(0));

                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at",
                    params![key, value, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

/// In-process store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::Persistence("memory store poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::Persistence("memory store poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
