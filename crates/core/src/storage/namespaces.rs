//! Version-tagged cache namespaces.
//!
//! A namespace is an isolated collection of cached request/response pairs,
//! named by the asset version that populated it. Eviction is whole-namespace:
//! entries cascade away with their namespace.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

use super::connection::LocalDb;
use crate::Error;

/// A cached response for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub request_key: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub cached_at: String,
}

/// Namespaced response cache shared by every open application context.
///
/// Writes to one namespace may race between contexts; implementations must
/// serialize them. A read that races a namespace deletion may miss.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the namespace if it does not exist yet.
    async fn open_namespace(&self, name: &str) -> Result<(), Error>;

    /// Names of all existing namespaces.
    async fn namespaces(&self) -> Result<Vec<String>, Error>;

    /// Find the entry for a request key in one namespace.
    async fn lookup(&self, namespace: &str, request_key: &str) -> Result<Option<CacheEntry>, Error>;

    /// Insert or overwrite one entry in an existing namespace.
    ///
    /// Never creates the namespace: a write that lands after the namespace
    /// was deleted fails with `Error::CacheNamespaceMissing`.
    async fn put(&self, namespace: &str, entry: CacheEntry) -> Result<(), Error>;

    /// Insert or overwrite a batch of entries atomically, creating the
    /// namespace if needed: either every entry is stored or none is.
    async fn put_all(&self, namespace: &str, entries: Vec<CacheEntry>) -> Result<(), Error>;

    /// Delete every entry of a namespace in one statement, keeping the
    /// namespace itself. Returns the number of entries removed.
    async fn clear_namespace(&self, name: &str) -> Result<u64, Error>;

    /// Drop a namespace and all of its entries. Returns false if it did not exist.
    async fn delete_namespace(&self, name: &str) -> Result<bool, Error>;
}

const UPSERT_ENTRY: &str = "INSERT INTO cache_entries (
        namespace, request_key, url, status, content_type, body, cached_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(namespace, request_key) DO UPDATE SET
        url = excluded.url,
        status = excluded.status,
        content_type = excluded.content_type,
        body = excluded.body,
        cached_at = excluded.cached_at";

const INSERT_NAMESPACE: &str = "INSERT OR IGNORE INTO cache_namespaces (name, created_at) VALUES (?1, ?2)";

fn write_entries(tx: &rusqlite::Transaction<'_>, namespace: &str, entries: &[CacheEntry]) -> Result<(), Error> {
    let mut stmt = tx.prepare(UPSERT_ENTRY)?;
    for entry in entries {
        stmt.execute(params![
            namespace,
            &entry.request_key,
            &entry.url,
            entry.status,
            &entry.content_type,
            &entry.body,
            &entry.cached_at,
        ])?;
    }
    Ok(())
}

fn insert_into_existing(conn: &mut rusqlite::Connection, namespace: &str, entry: &CacheEntry) -> Result<(), Error> {
    let tx = conn.transaction()?;
    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM cache_namespaces WHERE name = ?1)",
        params![namespace],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(Error::CacheNamespaceMissing(namespace.to_string()));
    }
    write_entries(&tx, namespace, std::slice::from_ref(entry))?;
    tx.commit()?;
    Ok(())
}

fn create_and_insert(conn: &mut rusqlite::Connection, namespace: &str, entries: &[CacheEntry]) -> Result<(), Error> {
    let tx = conn.transaction()?;
    tx.execute(INSERT_NAMESPACE, params![namespace, chrono::Utc::now().to_rfc3339()])?;
    write_entries(&tx, namespace, entries)?;
    tx.commit()?;
    Ok(())
}

#[async_trait]
impl CacheStorage for LocalDb {
    async fn open_namespace(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(INSERT_NAMESPACE, params![name, created_at])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn namespaces(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_namespaces ORDER BY created_at, name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn lookup(&self, namespace: &str, request_key: &str) -> Result<Option<CacheEntry>, Error> {
        let namespace = namespace.to_string();
        let request_key = request_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT request_key, url, status, content_type, body, cached_at
                    FROM cache_entries WHERE namespace = ?1 AND request_key = ?2",
                )?;

                let result = stmt.query_row(params![namespace, request_key], |row| {
                    Ok(CacheEntry {
                        request_key: row.get(0)?,
                        url: row.get(1)?,
                        status: row.get(2)?,
                        content_type: row.get(3)?,
                        body: row.get(4)?,
                        cached_at: row.get(5)?,
                    })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, namespace: &str, entry: CacheEntry) -> Result<(), Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| insert_into_existing(conn, &namespace, &entry))
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, namespace: &str, entries: Vec<CacheEntry>) -> Result<(), Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| create_and_insert(conn, &namespace, &entries))
            .await
            .map_err(Error::from)
    }

    async fn clear_namespace(&self, name: &str) -> Result<u64, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM cache_entries WHERE namespace = ?1", params![name])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_namespaces WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}

impl LocalDb {
    /// Number of entries stored in a namespace.
    pub async fn entry_count(&self, namespace: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE namespace = ?1",
                    params![namespace],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::hash::compute_request_key;

    fn make_entry(url: &str, body: &str) -> CacheEntry {
        CacheEntry {
            request_key: compute_request_key("GET", url),
            url: url.to_string(),
            status: 200,
            content_type: Some("text/html".to_string()),
            body: body.as_bytes().to_vec(),
            cached_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_put_and_lookup() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let entry = make_entry("https://calc.example/index.html", "<html>v1</html>");

        db.open_namespace("v1").await.unwrap();
        db.put("v1", entry.clone()).await.unwrap();

        let found = db.lookup("v1", &entry.request_key).await.unwrap().unwrap();
        assert_eq!(found, entry);
        assert!(db.lookup("v2", &entry.request_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = LocalDb::open_in_memory().await.unwrap();
        db.open_namespace("v1").await.unwrap();
        db.put("v1", make_entry("https://calc.example/", "old")).await.unwrap();
        db.put("v1", make_entry("https://calc.example/", "new")).await.unwrap();

        let key = compute_request_key("GET", "https://calc.example/");
        let found = db.lookup("v1", &key).await.unwrap().unwrap();
        assert_eq!(found.body, b"new");
        assert_eq!(db.entry_count("v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_all_creates_namespace() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let entries = vec![
            make_entry("https://calc.example/", "root"),
            make_entry("https://calc.example/styles.css", "body{}"),
        ];
        db.put_all("v1", entries).await.unwrap();

        assert_eq!(db.namespaces().await.unwrap(), vec!["v1".to_string()]);
        assert_eq!(db.entry_count("v1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_namespace_cascades() {
        let db = LocalDb::open_in_memory().await.unwrap();
        db.put_all("v1", vec![make_entry("https://calc.example/", "root")]).await.unwrap();
        db.open_namespace("v2").await.unwrap();

        assert!(db.delete_namespace("v1").await.unwrap());
        assert!(!db.delete_namespace("v1").await.unwrap());
        assert_eq!(db.namespaces().await.unwrap(), vec!["v2".to_string()]);
        assert_eq!(db.entry_count("v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_namespace_idempotent() {
        let db = LocalDb::open_in_memory().await.unwrap();
        db.open_namespace("v1").await.unwrap();
        db.open_namespace("v1").await.unwrap();
        assert_eq!(db.namespaces().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_does_not_recreate_deleted_namespace() {
        let db = LocalDb::open_in_memory().await.unwrap();
        db.put_all("v1", vec![make_entry("https://calc.example/", "root")]).await.unwrap();
        db.delete_namespace("v1").await.unwrap();

        let result = db.put("v1", make_entry("https://calc.example/index.html", "late")).await;
        assert!(matches!(result, Err(Error::CacheNamespaceMissing(name)) if name == "v1"));
        assert!(db.namespaces().await.unwrap().is_empty());
        assert_eq!(db.entry_count("v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_namespace_keeps_namespace() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let entries = vec![
            make_entry("https://calc.example/", "root"),
            make_entry("https://calc.example/script.js", "js"),
        ];
        db.put_all("v1", entries).await.unwrap();
        db.put_all("v2", vec![make_entry("https://calc.example/", "other")]).await.unwrap();

        assert_eq!(db.clear_namespace("v1").await.unwrap(), 2);
        assert_eq!(db.entry_count("v1").await.unwrap(), 0);
        assert_eq!(db.entry_count("v2").await.unwrap(), 1);

        let mut names = db.namespaces().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["v1".to_string(), "v2".to_string()]);

        db.put("v1", make_entry("https://calc.example/", "refilled")).await.unwrap();
        assert_eq!(db.entry_count("v1").await.unwrap(), 1);
    }
}
