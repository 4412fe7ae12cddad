use std::sync::atomic::Ordering;

use chrono::Utc;
use futures_util::future::try_join_all;

use firecalc_core::{CacheEntry, Error};

use super::{CacheManager, LifecycleState};
use crate::fetch::{AssetRequest, FetchResponse, resolve};

impl CacheManager {
    /// Fetch every static asset and store the set under this version's
    /// namespace in one atomic batch.
    ///
    /// Any fetch failure or non-success status fails the whole install: the
    /// manager becomes `Redundant` and nothing is written. On success the
    /// manager activates at once when `force_activate` is set, otherwise it
    /// parks in `Waiting`.
    pub async fn install(&self) -> Result<(), Error> {
        self.set_state(LifecycleState::Installing);

        match self.precache().await {
            Ok(count) => {
                tracing::info!(version = %self.settings.version, assets = count, "static assets cached");
            }
            Err(e) => {
                tracing::warn!(version = %self.settings.version, error = %e, "install failed");
                self.set_state(LifecycleState::Redundant);
                return Err(e);
            }
        }

        if self.settings.force_activate {
            self.activate().await
        } else {
            self.set_state(LifecycleState::Waiting);
            Ok(())
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        let fetches = self.settings.static_assets.iter().map(|path| self.fetch_asset(path));
        let entries = try_join_all(fetches).await?;
        let count = entries.len();
        self.storage.put_all(&self.settings.version, entries).await?;
        Ok(count)
    }

    async fn fetch_asset(&self, path: &str) -> Result<CacheEntry, Error> {
        let asset_error = |reason: String| Error::CacheAssetFetch { path: path.to_string(), reason };

        let url = resolve(&self.settings.origin, path).map_err(|e| asset_error(e.to_string()))?;
        let request = AssetRequest::get(url);
        let response = self.fetcher.fetch(&request).await.map_err(|e| asset_error(e.to_string()))?;

        if !response.status.is_success() {
            return Err(asset_error(format!("status {}", response.status.as_u16())));
        }

        Ok(entry_for(&request, &response))
    }

    /// Delete every namespace except this version's, claim open clients and
    /// become `Active`.
    ///
    /// Only valid after a successful install; a `Redundant` manager stays
    /// redundant and an already active one is left as is.
    pub async fn activate(&self) -> Result<(), Error> {
        match self.state() {
            LifecycleState::Redundant => {
                return Err(Error::InvalidInput(format!(
                    "cache version {} failed to install",
                    self.settings.version
                )));
            }
            LifecycleState::Active => return Ok(()),
            _ => {}
        }

        self.set_state(LifecycleState::Activating);

        for name in self.storage.namespaces().await? {
            if name != self.settings.version && self.storage.delete_namespace(&name).await? {
                tracing::info!(namespace = %name, "deleted stale cache namespace");
            }
        }

        self.controls_clients.store(true, Ordering::SeqCst);
        self.set_state(LifecycleState::Active);
        Ok(())
    }

    /// Handle the skip-waiting message: a waiting version activates now.
    pub async fn skip_waiting(&self) -> Result<(), Error> {
        match self.state() {
            LifecycleState::Waiting => self.activate().await,
            state => {
                tracing::debug!(version = %self.settings.version, ?state, "skip waiting ignored");
                Ok(())
            }
        }
    }

    /// Empty this version's namespace in one step, keeping the namespace.
    ///
    /// Requests that would have hit the cache fall through to the network
    /// and are cached again as they succeed.
    pub async fn clear(&self) -> Result<(), Error> {
        let version = &self.settings.version;
        let removed = self.storage.clear_namespace(version).await?;
        tracing::info!(%version, entries = removed, "cleared cache namespace");
        Ok(())
    }

    /// True once another version's namespace exists and this one is gone.
    /// A failed listing is logged and read as not superseded.
    pub(super) async fn superseded(&self) -> bool {
        match self.storage.namespaces().await {
            Ok(names) => !names.is_empty() && !names.contains(&self.settings.version),
            Err(e) => {
                tracing::warn!(version = %self.settings.version, error = %e, "cache namespace check failed, assuming current");
                false
            }
        }
    }
}

/// Cache entry for a fetched response, keyed by the original request.
pub(super) fn entry_for(request: &AssetRequest, response: &FetchResponse) -> CacheEntry {
    CacheEntry {
        request_key: request.cache_key(),
        url: request.url.to_string(),
        status: response.status.as_u16(),
        content_type: response.content_type.clone(),
        body: response.bytes.to_vec(),
        cached_at: Utc::now().to_rfc3339(),
    }
}
