//! Saved quote history.

pub mod store;

pub use store::{COLLECTION_KEY, MAX_SAVED_QUOTES, QuoteStore, SavedQuote};
