//! Core types and shared functionality for firecalc.
//!
//! This crate provides:
//! - The fire premium rate table and rating engine
//! - The bounded saved-quote history
//! - SQLite-backed key/value and versioned cache storage
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod quotes;
pub mod rating;
pub mod storage;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use quotes::{QuoteStore, SavedQuote};
pub use rating::{PremiumBreakdown, QuoteInput, RateTable, compute};
pub use storage::{CacheEntry, CacheStorage, KeyValueStore, LocalDb};
