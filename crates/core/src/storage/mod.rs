//! SQLite-backed local storage for quote history and the offline asset cache.
//!
//! This module provides a persistent store using SQLite with async access via
//! tokio-rusqlite. It supports:
//!
//! - A key/value surface for whole-document persistence
//! - Version-tagged cache namespaces with cascading eviction
//! - Automatic schema migrations
//! - WAL mode so several application contexts can share one file

pub mod connection;
pub mod hash;
pub mod kv;
pub mod migrations;
pub mod namespaces;

pub use crate::Error;

pub use connection::LocalDb;
pub use hash::compute_request_key;
pub use kv::{KeyValueStore, MemoryKv};
pub use namespaces::{CacheEntry, CacheStorage};
