//! Offline asset cache tools.

use firecalc_client::fetch::resolve;
use firecalc_client::{AssetRequest, CacheManager, ControlHandle, ControlReply, LifecycleState, ServeSource};
use firecalc_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::quote::json_result;

/// Parameters for the serve_asset tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ServeAssetParams {
    /// Root-relative path (`/styles.css`) or absolute http(s) URL.
    pub path: String,

    /// HTTP method (default: GET). Only GET requests use the cache.
    #[serde(default = "default_method")]
    pub method: String,

    /// Treat the request as a top-level document navigation.
    #[serde(default)]
    pub navigate: bool,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the serve_asset tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServeAssetOutput {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub source: ServeSource,
    /// Body as text; invalid UTF-8 is replaced.
    pub body: String,
    pub bytes: usize,
    /// A background refresh of this cached document was started.
    pub revalidating: bool,
}

/// Output from the cache_version and cache_skip_waiting tools.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatusOutput {
    pub version: String,
    pub state: LifecycleState,
    pub controls_clients: bool,
}

/// Implementation of the serve_asset tool.
pub async fn serve_impl(cache: &CacheManager, params: ServeAssetParams) -> Result<CallToolResult, McpError> {
    let url = resolve(cache.origin(), &params.path).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let request = AssetRequest::new(&params.method, url, params.navigate)?;
    let url = request.url.to_string();

    let served = cache.serve(request).await?;

    let output = ServeAssetOutput {
        url,
        status: served.status.as_u16(),
        content_type: served.content_type,
        source: served.source,
        body: String::from_utf8_lossy(&served.body).into_owned(),
        bytes: served.body.len(),
        revalidating: served.revalidation.is_some(),
    };
    json_result(&output)
}

async fn status(cache: &CacheManager, control: &ControlHandle) -> Result<CacheStatusOutput, Error> {
    Ok(CacheStatusOutput {
        version: control.version().await?,
        state: cache.state(),
        controls_clients: cache.controls_clients(),
    })
}

/// Implementation of the cache_version tool.
pub async fn version_impl(cache: &CacheManager, control: &ControlHandle) -> Result<CallToolResult, McpError> {
    json_result(&status(cache, control).await?)
}

/// Implementation of the cache_skip_waiting tool.
pub async fn skip_waiting_impl(cache: &CacheManager, control: &ControlHandle) -> Result<CallToolResult, McpError> {
    control.skip_waiting().await?;
    json_result(&status(cache, control).await?)
}

/// Implementation of the cache_clear tool. Empties the current version's
/// namespace; a failed clear is reported in the reply, not as a tool error.
pub async fn clear_impl(control: &ControlHandle) -> Result<CallToolResult, McpError> {
    let reply = control.clear_cache().await?;
    if let ControlReply::Cleared { success: false, error } = &reply {
        tracing::warn!(?error, "cache clear failed");
    }
    json_result(&reply)
}
