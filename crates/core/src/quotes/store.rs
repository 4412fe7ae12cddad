//! Bounded, persisted history of computed quotes.
//!
//! The whole collection is written back on every mutation; there are no
//! incremental patches. A failed write leaves the in-memory view untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::rating::{PremiumBreakdown, QuoteInput};
use crate::storage::KeyValueStore;

/// Key the serialized history is stored under.
pub const COLLECTION_KEY: &str = "fireCalculations";

/// Most quotes kept; older ones are evicted on save.
pub const MAX_SAVED_QUOTES: usize = 10;

/// A computed quote kept in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuote {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub input: QuoteInput,
    pub breakdown: PremiumBreakdown,
}

/// Quote history over an injected key/value store.
pub struct QuoteStore {
    kv: Arc<dyn KeyValueStore>,
    /// Oldest first.
    quotes: Vec<SavedQuote>,
    last_id: u64,
}

impl std::fmt::Debug for QuoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteStore")
            .field("quotes", &self.quotes.len())
            .field("last_id", &self.last_id)
            .finish()
    }
}

fn chronological(a: &SavedQuote, b: &SavedQuote) -> std::cmp::Ordering {
    a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
}

impl QuoteStore {
    /// Restore the history from the store. A missing document is an empty history.
    ///
    /// # Errors
    ///
    /// Returns `Error::Persistence` if the stored document cannot be read or parsed.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Result<Self, Error> {
        let mut quotes: Vec<SavedQuote> = match kv.get(COLLECTION_KEY).await? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        quotes.sort_by(chronological);

        let last_id = quotes.iter().map(|q| q.id).max().unwrap_or(0);
        tracing::debug!(count = quotes.len(), last_id, "loaded quote history");

        Ok(Self { kv, quotes, last_id })
    }

    /// Ids never repeat: once the id space is used up, saving fails.
    fn next_id(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let after_last = self
            .last_id
            .checked_add(1)
            .ok_or_else(|| Error::Persistence(format!("quote id {} is the largest possible id", self.last_id)))?;
        Ok(millis.max(after_last))
    }

    async fn persist(&self, quotes: &[SavedQuote]) -> Result<(), Error> {
        let json = serde_json::to_string(quotes).map_err(|e| Error::Persistence(e.to_string()))?;
        self.kv.set(COLLECTION_KEY, &json).await
    }

    /// Record a quote, evicting the oldest entries beyond capacity.
    ///
    /// The collection is persisted before this returns.
    pub async fn save(&mut self, input: QuoteInput, breakdown: PremiumBreakdown) -> Result<SavedQuote, Error> {
        let created_at = Utc::now();
        let saved = SavedQuote { id: self.next_id(created_at)?, created_at, input, breakdown };

        let mut next = self.quotes.clone();
        next.push(saved.clone());
        next.sort_by(chronological);
        let overflow = next.len().saturating_sub(MAX_SAVED_QUOTES);
        let evicted: Vec<u64> = next.drain(..overflow).map(|q| q.id).collect();

        self.persist(&next).await?;

        if !evicted.is_empty() {
            tracing::debug!(?evicted, "evicted oldest saved quotes");
        }
        tracing::info!(id = saved.id, total = next.len(), "saved quote");

        self.quotes = next;
        self.last_id = saved.id;
        Ok(saved)
    }

    /// Saved quotes, most recent first.
    pub fn list(&self) -> Vec<SavedQuote> {
        self.quotes.iter().rev().cloned().collect()
    }

    /// Look up a saved quote.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no quote has this id.
    pub fn get(&self, id: u64) -> Result<&SavedQuote, Error> {
        self.quotes.iter().find(|q| q.id == id).ok_or(Error::NotFound(id))
    }

    /// Delete a saved quote and persist the remaining history.
    pub async fn delete(&mut self, id: u64) -> Result<(), Error> {
        if !self.quotes.iter().any(|q| q.id == id) {
            return Err(Error::NotFound(id));
        }

        let next: Vec<SavedQuote> = self.quotes.iter().filter(|q| q.id != id).cloned().collect();
        self.persist(&next).await?;

        tracing::info!(id, remaining = next.len(), "deleted quote");
        self.quotes = next;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::{RateTable, compute};
    use crate::storage::{LocalDb, MemoryKv};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Store whose writes can be switched to fail.
    #[derive(Default)]
    struct FlakyKv {
        inner: MemoryKv,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for FlakyKv {
        async fn get(&self, key: &str) -> Result<Option<String>, Error> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::Persistence("disk full".into()));
            }
            self.inner.set(key, value).await
        }
    }

    fn make_quote(sum_insured: u64) -> (QuoteInput, PremiumBreakdown) {
        let input = QuoteInput {
            property_type: "residential".into(),
            sum_insured,
            location: "delhi".into(),
            construction_type: "pucca".into(),
            property_age: 5,
            occupancy_type: "own-residence".into(),
            fire_safety_features: BTreeSet::new(),
            security_features: BTreeSet::new(),
        };
        let breakdown = compute(&RateTable::standard(), &input).unwrap();
        (input, breakdown)
    }

    async fn empty_store() -> QuoteStore {
        QuoteStore::load(Arc::new(MemoryKv::new())).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let mut store = empty_store().await;
        let (input, breakdown) = make_quote(500_000);

        let saved = store.save(input.clone(), breakdown.clone()).await.unwrap();

        let found = store.get(saved.id).unwrap();
        assert_eq!(found.input, input);
        assert_eq!(found.breakdown, breakdown);
    }

    #[tokio::test]
    async fn test_list_most_recent_first() {
        let mut store = empty_store().await;
        let mut ids = Vec::new();
        for sum in [10_000, 20_000, 30_000] {
            let (input, breakdown) = make_quote(sum);
            ids.push(store.save(input, breakdown).await.unwrap().id);
        }

        let listed: Vec<u64> = store.list().iter().map(|q| q.id).collect();
        ids.reverse();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_increasing() {
        let mut store = empty_store().await;
        let mut last = 0;
        for _ in 0..5 {
            let (input, breakdown) = make_quote(1_000);
            let id = store.save(input, breakdown).await.unwrap().id;
            assert!(id > last);
            last = id;
        }
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let mut store = empty_store().await;
        let mut ids = Vec::new();
        for i in 0..=MAX_SAVED_QUOTES as u64 {
            let (input, breakdown) = make_quote(1_000 + i);
            ids.push(store.save(input, breakdown).await.unwrap().id);
            assert!(store.len() <= MAX_SAVED_QUOTES);
        }

        assert_eq!(store.len(), MAX_SAVED_QUOTES);
        assert!(matches!(store.get(ids[0]), Err(Error::NotFound(_))));
        assert!(store.get(ids[1]).is_ok());
        assert!(store.get(ids[MAX_SAVED_QUOTES]).is_ok());
    }

    #[tokio::test]
    async fn test_delete() {
        let mut store = empty_store().await;
        let (input, breakdown) = make_quote(5_000);
        let saved = store.save(input, breakdown).await.unwrap();

        store.delete(saved.id).await.unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.delete(saved.id).await, Err(Error::NotFound(id)) if id == saved.id));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = empty_store().await;
        assert!(matches!(store.get(7), Err(Error::NotFound(7))));
    }

    #[tokio::test]
    async fn test_persists_whole_collection() {
        let kv = Arc::new(MemoryKv::new());
        let mut store = QuoteStore::load(kv.clone()).await.unwrap();
        for sum in [1_000, 2_000] {
            let (input, breakdown) = make_quote(sum);
            store.save(input, breakdown).await.unwrap();
        }

        let json = kv.get(COLLECTION_KEY).await.unwrap().unwrap();
        let stored: Vec<SavedQuote> = serde_json::from_str(&json).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].input.sum_insured, 1_000);
    }

    #[tokio::test]
    async fn test_reload_restores_history() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(LocalDb::open_in_memory().await.unwrap());
        let mut store = QuoteStore::load(kv.clone()).await.unwrap();
        let (input, breakdown) = make_quote(750_000);
        let saved = store.save(input, breakdown).await.unwrap();

        let mut reloaded = QuoteStore::load(kv).await.unwrap();
        assert_eq!(reloaded.get(saved.id).unwrap(), &saved);

        let (input, breakdown) = make_quote(1_000);
        let next = reloaded.save(input, breakdown).await.unwrap();
        assert!(next.id > saved.id);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_view_unchanged() {
        let kv = Arc::new(FlakyKv::default());
        let mut store = QuoteStore::load(kv.clone()).await.unwrap();
        let (input, breakdown) = make_quote(1_000);
        let kept = store.save(input.clone(), breakdown.clone()).await.unwrap();

        kv.fail_writes.store(true, Ordering::SeqCst);

        let result = store.save(input, breakdown).await;
        assert!(matches!(result, Err(Error::Persistence(_))));
        assert_eq!(store.len(), 1);

        let result = store.delete(kept.id).await;
        assert!(matches!(result, Err(Error::Persistence(_))));
        assert!(store.get(kept.id).is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_persistence_error() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(COLLECTION_KEY, "not json").await.unwrap();
        let result = QuoteStore::load(kv).await;
        assert!(matches!(result, Err(Error::Persistence(_))));
    }

    #[tokio::test]
    async fn test_largest_stored_id_refuses_new_quote() {
        let kv = Arc::new(MemoryKv::new());
        let mut seeded = QuoteStore::load(kv.clone()).await.unwrap();
        let (input, breakdown) = make_quote(1_000);
        let mut saved = seeded.save(input, breakdown).await.unwrap();
        saved.id = u64::MAX;
        kv.set(COLLECTION_KEY, &serde_json::to_string(&vec![saved.clone()]).unwrap()).await.unwrap();

        let mut store = QuoteStore::load(kv).await.unwrap();
        let (input, breakdown) = make_quote(2_000);
        let result = store.save(input, breakdown).await;

        assert!(matches!(result, Err(Error::Persistence(_))));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(u64::MAX).unwrap(), &saved);
    }
}
