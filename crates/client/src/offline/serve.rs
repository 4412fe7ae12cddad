use std::sync::Arc;

use reqwest::{Method, StatusCode, Url};
use tokio::task::JoinHandle;

use firecalc_core::{CacheEntry, Error};

use super::lifecycle::entry_for;
use super::{CacheManager, LifecycleState, ServeSource, Served};
use crate::fetch::{AssetRequest, FetchResponse, resolve, same_origin};

impl CacheManager {
    /// Answer a request from the active version's namespace, falling back to
    /// the network.
    ///
    /// 1. Non-GET, non-http(s), or no active version: plain network fetch.
    /// 2. Cache hit: served as stored. Documents also get a background
    ///    refresh whose outcome never reaches the caller.
    /// 3. Miss: network fetch. A same-origin 200 is stored for next time.
    ///    If another version has deleted this namespace, the manager turns
    ///    `Redundant` and stops intercepting. A late store into a deleted
    ///    namespace is refused by storage and only logged.
    /// 4. Network failure on a navigation: the cached offline fallback
    ///    document, if there is one. Otherwise the failure propagates.
    pub async fn serve(&self, request: AssetRequest) -> Result<Served, Error> {
        let intercepted = request.method == Method::GET
            && matches!(request.url.scheme(), "http" | "https")
            && self.state() == LifecycleState::Active;

        if !intercepted {
            let response = self.fetcher.fetch(&request).await?;
            return Ok(Served::from_response(response, ServeSource::Bypass));
        }

        let version = &self.settings.version;
        match self.storage.lookup(version, &request.cache_key()).await {
            Ok(Some(entry)) => {
                tracing::debug!(url = %request.url, "cache hit");
                let revalidation = request.is_document().then(|| self.spawn_revalidation(request.clone()));
                return Served::from_entry(entry, ServeSource::Cache, revalidation);
            }
            Ok(None) if self.superseded().await => {
                self.set_state(LifecycleState::Redundant);
                tracing::info!(%version, "cache namespace gone, version superseded");
                let response = self.fetcher.fetch(&request).await?;
                return Ok(Served::from_response(response, ServeSource::Bypass));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(url = %request.url, error = %e, "cache lookup failed, using network"),
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if is_cacheable(&self.settings.origin, &response)
                    && let Err(e) = self.storage.put(version, entry_for(&request, &response)).await
                {
                    tracing::warn!(url = %request.url, error = %e, "failed to cache response");
                }
                Ok(Served::from_response(response, ServeSource::Network))
            }
            Err(e) if request.navigate => self.offline_fallback(e).await,
            Err(e) => Err(e),
        }
    }

    async fn offline_fallback(&self, cause: Error) -> Result<Served, Error> {
        let url = resolve(&self.settings.origin, &self.settings.offline_fallback)
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let key = AssetRequest::get(url).cache_key();

        match self.storage.lookup(&self.settings.version, &key).await? {
            Some(entry) => {
                tracing::info!(error = %cause, "navigation failed, serving offline fallback");
                Served::from_entry(entry, ServeSource::OfflineFallback, None)
            }
            None => Err(cause),
        }
    }

    fn spawn_revalidation(&self, request: AssetRequest) -> JoinHandle<()> {
        let storage = Arc::clone(&self.storage);
        let fetcher = Arc::clone(&self.fetcher);
        let origin = self.settings.origin.clone();
        let version = self.settings.version.clone();

        tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) if is_cacheable(&origin, &response) => {
                    match storage.put(&version, entry_for(&request, &response)).await {
                        Ok(()) => tracing::debug!(url = %request.url, "revalidated cached document"),
                        Err(e) => tracing::warn!(url = %request.url, error = %e, "failed to store revalidation"),
                    }
                }
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status.as_u16(), "revalidation not cacheable");
                }
                Err(e) => tracing::warn!(url = %request.url, error = %e, "revalidation failed"),
            }
        })
    }
}

/// Only same-origin 200 responses go into the cache.
fn is_cacheable(origin: &Url, response: &FetchResponse) -> bool {
    response.status == StatusCode::OK && same_origin(origin, &response.final_url)
}

impl Served {
    fn from_response(response: FetchResponse, source: ServeSource) -> Self {
        Self {
            status: response.status,
            content_type: response.content_type,
            body: response.bytes,
            source,
            revalidation: None,
        }
    }

    fn from_entry(entry: CacheEntry, source: ServeSource, revalidation: Option<JoinHandle<()>>) -> Result<Self, Error> {
        let status = StatusCode::from_u16(entry.status)
            .map_err(|_| Error::Persistence(format!("cached entry {} has status {}", entry.url, entry.status)))?;
        Ok(Self { status, content_type: entry.content_type, body: entry.body.into(), source, revalidation })
    }
}
