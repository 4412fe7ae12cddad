//! Client code for firecalc.
//!
//! This crate provides the network fetch capability and the versioned
//! offline asset cache used by the server.

pub mod fetch;
pub mod offline;

pub use fetch::{AssetRequest, FetchConfig, FetchResponse, Fetcher, HttpFetcher};
pub use offline::{
    CacheManager, CacheSettings, ControlHandle, ControlMessage, ControlReply, LifecycleState, ServeSource, Served,
    spawn_control,
};
