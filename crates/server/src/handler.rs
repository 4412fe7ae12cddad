//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use firecalc_client::{CacheManager, ControlHandle};
use firecalc_core::{QuoteInput, QuoteStore, RateTable};
use tokio::sync::Mutex;

use crate::tools::{QuoteIdParams, ServeAssetParams, offline, quote};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for firecalc.
#[derive(Clone)]
pub struct FireCalcServer {
    tool_router: ToolRouter<Self>,
    rates: Arc<RateTable>,
    quotes: Arc<Mutex<QuoteStore>>,
    cache: Arc<CacheManager>,
    control: ControlHandle,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl FireCalcServer {
    /// Create a new server handler.
    pub fn new(rates: RateTable, quotes: QuoteStore, cache: Arc<CacheManager>, control: ControlHandle) -> Self {
        Self {
            tool_router: Self::tool_router(),
            rates: Arc::new(rates),
            quotes: Arc::new(Mutex::new(quotes)),
            cache,
            control,
        }
    }

    #[tool(
        description = "Compute a fire insurance premium. Returns the exact breakdown and line items rounded to paise."
    )]
    async fn compute_premium(&self, params: Parameters<QuoteInput>) -> Result<CallToolResult, McpError> {
        quote::compute_impl(&self.rates, params.0).await
    }

    /// Validates, recomputes and records the quote; the history keeps the 10 most recent.
    #[tool(description = "Compute a premium and save it to the quote history (10 most recent are kept).")]
    async fn save_quote(&self, params: Parameters<QuoteInput>) -> Result<CallToolResult, McpError> {
        quote::save_impl(&self.rates, &self.quotes, params.0).await
    }

    #[tool(description = "List saved quotes, most recent first.")]
    async fn list_quotes(&self) -> Result<CallToolResult, McpError> {
        quote::list_impl(&self.quotes).await
    }

    #[tool(description = "Get a saved quote by id.")]
    async fn get_quote(&self, params: Parameters<QuoteIdParams>) -> Result<CallToolResult, McpError> {
        quote::get_impl(&self.quotes, params.0).await
    }

    #[tool(description = "Delete a saved quote by id.")]
    async fn delete_quote(&self, params: Parameters<QuoteIdParams>) -> Result<CallToolResult, McpError> {
        quote::delete_impl(&self.quotes, params.0).await
    }

    /// Serve a request through the offline cache.
    ///
    /// GET requests are answered cache-first once a version is active;
    /// failed navigations fall back to the cached root document.
    #[tool(description = "Serve an application asset through the offline cache (cache-first, offline fallback).")]
    async fn serve_asset(&self, params: Parameters<ServeAssetParams>) -> Result<CallToolResult, McpError> {
        offline::serve_impl(&self.cache, params.0).await
    }

    #[tool(description = "Report the offline cache version and lifecycle state.")]
    async fn cache_version(&self) -> Result<CallToolResult, McpError> {
        offline::version_impl(&self.cache, &self.control).await
    }

    #[tool(description = "Empty the current offline cache version; assets are cached again as they are served.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        offline::clear_impl(&self.control).await
    }

    #[tool(description = "Activate a waiting cache version now.")]
    async fn cache_skip_waiting(&self) -> Result<CallToolResult, McpError> {
        offline::skip_waiting_impl(&self.cache, &self.control).await
    }
}

impl ServerHandler for FireCalcServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "firecalc".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
