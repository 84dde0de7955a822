//! Request handlers and query-string parsing.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio::task;
use tracing::error;

use crate::{
    Browser, ItemLimits, ItemRequest, NodeFrameQuery, NodeRequest, QueryEngine, SearchRequest,
};

pub(crate) type Params = HashMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Browser(#[from] crate::Error),
    #[error("internal task failure: {0}")]
    Join(#[from] task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => {
                error!(err = %self, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorPayload { error: self.to_string() })).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    error: String,
}

// ============================================================================
// Parameter parsing
// ============================================================================

/// `true` in any case is true; anything else is false.
pub(crate) fn flag(params: &Params, name: &str, default: bool) -> bool {
    params.get(name).map_or(default, |v| v.trim().eq_ignore_ascii_case("true"))
}

pub(crate) fn number(params: &Params, name: &str, default: usize) -> Result<usize, ApiError> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("parameter '{name}' must be a non-negative integer, got '{v}'"))),
    }
}

pub(crate) fn required<'p>(params: &'p Params, name: &str) -> Result<&'p str, ApiError> {
    match params.get(name).map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("missing parameter '{name}'"))),
    }
}

fn item_request<E: QueryEngine>(browser: &Browser<E>, params: &Params) -> Result<ItemRequest, ApiError> {
    let d = browser.config().browser.item_defaults;
    Ok(ItemRequest {
        node: required(params, "id")?.to_string(),
        lang: browser.resolve_lang(params.get("lang").map(String::as_str)),
        limits: ItemLimits {
            proplist_max_len: number(params, "proplist_max_len", d.proplist_max_len)?,
            valuelist_max_len: number(params, "valuelist_max_len", d.valuelist_max_len)?,
            qual_proplist_max_len: number(params, "qual_proplist_max_len", d.qual_proplist_max_len)?,
            qual_valuelist_max_len: number(params, "qual_valuelist_max_len", d.qual_valuelist_max_len)?,
            query_limit: number(params, "query_limit", d.query_limit)?,
            qual_query_limit: number(params, "qual_query_limit", d.qual_query_limit)?,
        },
    })
}

fn node_request<E: QueryEngine>(browser: &Browser<E>, params: &Params) -> Result<NodeRequest, ApiError> {
    Ok(NodeRequest {
        node: required(params, "node")?.to_string(),
        lang: browser.resolve_lang(params.get("lang").map(String::as_str)),
        images: flag(params, "images", false),
        fanouts: flag(params, "fanouts", false),
        inverse: flag(params, "inverse", false),
    })
}

fn search_request<E: QueryEngine>(browser: &Browser<E>, params: &Params) -> Result<SearchRequest, ApiError> {
    let q = params.get("q").map(String::as_str).unwrap_or("");
    let base = SearchRequest::new(q, &browser.resolve_lang(params.get("lang").map(String::as_str)));
    Ok(SearchRequest {
        match_item_exactly: flag(params, "match_item_exactly", base.match_item_exactly),
        match_label_exactly: flag(params, "match_label_exactly", base.match_label_exactly),
        match_item_prefixes: flag(params, "match_item_prefixes", base.match_item_prefixes),
        match_item_prefixes_limit: number(params, "match_item_prefixes_limit", base.match_item_prefixes_limit)?,
        match_label_prefixes: flag(params, "match_label_prefixes", base.match_label_prefixes),
        match_label_prefixes_limit: number(params, "match_label_prefixes_limit", base.match_label_prefixes_limit)?,
        match_label_ignore_case: flag(params, "match_label_ignore_case", base.match_label_ignore_case),
        ..base
    })
}

// ============================================================================
// Handlers
// ============================================================================

pub(crate) async fn item<E: QueryEngine>(
    State(browser): State<Arc<Browser<E>>>,
    Query(params): Query<Params>,
) -> Result<Response, ApiError> {
    let req = item_request(&browser, &params)?;
    let doc = task::spawn_blocking(move || browser.get_item(&req)).await??;
    Ok(Json(doc.as_ref()).into_response())
}

pub(crate) async fn related_items<E: QueryEngine>(
    State(browser): State<Arc<Browser<E>>>,
    Query(params): Query<Params>,
) -> Result<Response, ApiError> {
    let req = item_request(&browser, &params)?;
    let doc = task::spawn_blocking(move || browser.get_related_items(&req)).await??;
    Ok(Json(doc.as_ref()).into_response())
}

pub(crate) async fn query<E: QueryEngine>(
    State(browser): State<Arc<Browser<E>>>,
    Query(params): Query<Params>,
) -> Result<Response, ApiError> {
    let req = search_request(&browser, &params)?;
    let found = task::spawn_blocking(move || browser.search(&req)).await??;
    Ok(Json(found.as_ref()).into_response())
}

pub(crate) async fn all_node_data<E: QueryEngine>(
    State(browser): State<Arc<Browser<E>>>,
    Query(params): Query<Params>,
) -> Result<Response, ApiError> {
    let req = node_request(&browser, &params)?;
    let data = task::spawn_blocking(move || browser.get_all_node_data(&req)).await??;
    Ok(match data {
        Some(collection) => Json(collection.as_ref()).into_response(),
        None => Json(serde_json::json!({})).into_response(),
    })
}

pub(crate) async fn node_frame<E: QueryEngine>(
    State(browser): State<Arc<Browser<E>>>,
    Query(params): Query<Params>,
    which: NodeFrameQuery,
) -> Result<String, ApiError> {
    let req = node_request(&browser, &params)?;
    let frame = task::spawn_blocking(move || browser.node_frame(which, &req)).await??;
    Ok(frame.to_string())
}

pub(crate) async fn configuration<E: QueryEngine>(
    State(browser): State<Arc<Browser<E>>>,
) -> Json<crate::BrowserConfig> {
    Json(browser.config().clone())
}
