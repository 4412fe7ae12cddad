//! MCP tool implementations.
//!
//! This module contains all tools exposed by the firecalc server.

pub mod offline;
pub mod quote;

pub use offline::ServeAssetParams;
pub use quote::QuoteIdParams;
