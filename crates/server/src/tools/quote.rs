//! Rating and quote history tools.

use firecalc_core::rating::LineItem;
use firecalc_core::{Error, PremiumBreakdown, QuoteInput, QuoteStore, RateTable, SavedQuote, compute};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Parameters for the get_quote and delete_quote tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QuoteIdParams {
    /// Id of a saved quote, as returned by save_quote or list_quotes.
    pub id: u64,
}

/// Output from the compute_premium tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputePremiumOutput {
    /// Exact breakdown, unrounded.
    pub breakdown: PremiumBreakdown,
    /// Breakdown in rating order, money rounded to paise.
    pub line_items: Vec<LineItem>,
}

/// Output from the list_quotes tool.
#[derive(Debug, Clone, Serialize)]
pub struct ListQuotesOutput {
    pub count: usize,
    /// Most recent first.
    pub quotes: Vec<SavedQuote>,
}

/// Output from the delete_quote tool.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteQuoteOutput {
    pub deleted: u64,
    pub remaining: usize,
}

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn rate(table: &RateTable, input: &QuoteInput) -> Result<PremiumBreakdown, Error> {
    input.validate()?;
    compute(table, input)
}

/// Implementation of the compute_premium tool.
pub async fn compute_impl(table: &RateTable, input: QuoteInput) -> Result<CallToolResult, McpError> {
    let breakdown = rate(table, &input)?;
    tracing::debug!(property_type = %input.property_type, total = %breakdown.total_premium, "computed premium");

    let line_items = breakdown.rounded().line_items();
    json_result(&ComputePremiumOutput { breakdown, line_items })
}

/// Implementation of the save_quote tool. The premium is recomputed from the
/// input so a saved breakdown always matches its input.
pub async fn save_impl(
    table: &RateTable, store: &Mutex<QuoteStore>, input: QuoteInput,
) -> Result<CallToolResult, McpError> {
    let breakdown = rate(table, &input)?;
    let saved = store.lock().await.save(input, breakdown).await?;
    json_result(&saved)
}

/// Implementation of the list_quotes tool.
pub async fn list_impl(store: &Mutex<QuoteStore>) -> Result<CallToolResult, McpError> {
    let quotes = store.lock().await.list();
    json_result(&ListQuotesOutput { count: quotes.len(), quotes })
}

/// Implementation of the get_quote tool.
pub async fn get_impl(store: &Mutex<QuoteStore>, params: QuoteIdParams) -> Result<CallToolResult, McpError> {
    let store = store.lock().await;
    let quote = store.get(params.id)?;
    json_result(quote)
}

/// Implementation of the delete_quote tool.
pub async fn delete_impl(store: &Mutex<QuoteStore>, params: QuoteIdParams) -> Result<CallToolResult, McpError> {
    let mut store = store.lock().await;
    store.delete(params.id).await?;
    json_result(&DeleteQuoteOutput { deleted: params.id, remaining: store.len() })
}
