use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use docrag_search::{RetrievalResult, Retriever, SearchError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub(crate) struct HttpState {
    pub retriever: Retriever,
    pub default_top_k: usize,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchParams {
    query: Option<String>,
    /// Kept as text so a malformed value is a 400 with the usual body
    top_k: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResultItem {
    rank: usize,
    text: String,
    distance: f32,
}

impl From<RetrievalResult> for ResultItem {
    fn from(result: RetrievalResult) -> Self {
        Self {
            rank: result.rank,
            text: result.text,
            distance: result.distance,
        }
    }
}

type JsonResponse = (StatusCode, Json<Value>);

pub(crate) fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(http_home))
        .route("/search", get(http_search))
        .route("/health", get(http_health))
        .with_state(state)
}

async fn http_home() -> Json<Value> {
    Json(json!({"message": "API is running", "endpoints": ["/search"]}))
}

async fn http_search(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<SearchParams>,
) -> JsonResponse {
    let query = params.query.unwrap_or_default().trim().to_string();
    if query.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Query parameter is required");
    }
    let top_k = match params.top_k.as_deref().map(str::trim) {
        None | Some("") => state.default_top_k,
        Some(raw) => match raw.parse::<usize>() {
            Ok(top_k) if top_k > 0 => top_k,
            _ => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "top_k must be a positive integer",
                )
            }
        },
    };

    match state.retriever.retrieve(&query, top_k).await {
        Ok(results) => {
            let results: Vec<ResultItem> = results.into_iter().map(ResultItem::from).collect();
            (
                StatusCode::OK,
                Json(json!({"query": query, "results": results})),
            )
        }
        Err(err) => {
            let status = status_for(&err);
            if status.is_server_error() {
                log::error!("Search for '{query}' failed: {err}");
            }
            error_response(status, &err.to_string())
        }
    }
}

async fn http_health(State(state): State<Arc<HttpState>>) -> JsonResponse {
    let status = state.retriever.knowledge_base().status();
    let healthy = status.pending == 0;
    (
        StatusCode::OK,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "store": status,
        })),
    )
}

fn status_for(err: &SearchError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn error_response(status: StatusCode, message: &str) -> JsonResponse {
    (status, Json(json!({"error": message, "results": []})))
}
