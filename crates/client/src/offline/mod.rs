//! Offline asset cache with versioned namespaces.
//!
//! A [`CacheManager`] owns one asset version. Its lifecycle is
//! `Installing → Waiting → Activating → Active`:
//!
//! - **install** fetches the static asset manifest and stores it as one
//!   atomic batch under the version's namespace
//! - **activate** deletes every namespace of other versions and takes
//!   control of open clients
//! - **serve** answers GET requests cache-first, refreshing cached documents
//!   in the background, and falls back to the cached root document for
//!   navigations when the network is down
//!
//! Several managers (one per open application context) may share the same
//! [`CacheStorage`].

mod control;
mod lifecycle;
mod serve;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use firecalc_core::{AppConfig, CacheStorage, Error};

use crate::fetch::Fetcher;

pub use control::{ControlHandle, ControlMessage, ControlReply, spawn_control};

/// Lifecycle of one asset version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Installing,
    /// Installed, waiting for the skip-waiting message.
    Waiting,
    Activating,
    Active,
    /// Install failed; this version will never serve.
    Redundant,
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServeSource {
    Cache,
    Network,
    OfflineFallback,
    /// Not intercepted: non-GET, non-http(s), or no active version.
    Bypass,
}

/// A response handed back to the requesting context.
#[derive(Debug)]
pub struct Served {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub source: ServeSource,
    /// Background refresh of a cached document, if one was started.
    pub revalidation: Option<JoinHandle<()>>,
}

/// Cache manager settings for one asset version.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub version: String,
    pub origin: Url,
    pub static_assets: Vec<String>,
    pub offline_fallback: String,
    pub force_activate: bool,
}

impl CacheSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        Ok(Self {
            version: config.cache_version.clone(),
            origin,
            static_assets: config.static_assets.clone(),
            offline_fallback: config.offline_fallback.clone(),
            force_activate: config.force_activate,
        })
    }
}

/// Versioned asset cache and request-serving policy.
pub struct CacheManager {
    settings: CacheSettings,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    state: watch::Sender<LifecycleState>,
    controls_clients: AtomicBool,
}

impl CacheManager {
    /// Create a manager for `settings.version`. It starts in `Installing`
    /// and serves nothing from cache until [`install`](Self::install) and
    /// activation complete.
    pub fn new(settings: CacheSettings, storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        let (state, _) = watch::channel(LifecycleState::Installing);
        Self { settings, storage, fetcher, state, controls_clients: AtomicBool::new(false) }
    }

    /// The version tag, which is also the namespace name.
    pub fn version(&self) -> &str {
        &self.settings.version
    }

    pub fn origin(&self) -> &Url {
        &self.settings.origin
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Whether activation has claimed the open clients.
    pub fn controls_clients(&self) -> bool {
        self.controls_clients.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::info!(version = %self.settings.version, ?previous, ?next, "cache lifecycle transition");
        }
    }
}
