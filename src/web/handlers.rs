//! HTTP handlers of the REST mirror
//!
//! Every answer is wrapped in a `{"status": ...}` envelope: `OK` with an
//! optional `result`, or `error` with a message.

use super::format::ListFormat;
use crate::error::{Result, StoreError};
use crate::store::Store;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub request_timeout: Option<Duration>,
}

impl AppState {
    /// Run a store call under the request timeout
    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| Err(StoreError::Timeout)),
            None => call.await,
        }
    }
}

/// Failure answered with the error envelope
#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_missing() {
            return ApiError::NotFound;
        }
        error!("REST request failed: {}", err);
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "status": "error", "error": msg }))).into_response()
    }
}

fn dbnum(raw: &str) -> std::result::Result<u32, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid database number: {}", raw)))
}

fn ok() -> Response {
    Json(json!({ "status": "OK" })).into_response()
}

fn ok_with(result: serde_json::Value) -> Response {
    Json(json!({ "status": "OK", "result": result })).into_response()
}

/// GET /:dbnum/:key
///
/// A JSON value is embedded as is, anything else as a JSON string.
pub async fn get_value(
    State(state): State<AppState>,
    Path((db, key)): Path<(String, String)>,
) -> std::result::Result<Response, ApiError> {
    let dbnum = dbnum(&db)?;
    debug!(dbnum, key = %key, "REST get");

    let value = state.bounded(state.store.get(dbnum, &key)).await?;
    let result = serde_json::from_slice(&value)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&value).into_owned()));
    Ok(ok_with(result))
}

/// PUT|POST /:dbnum/:key
pub async fn set_value(
    State(state): State<AppState>,
    Path((db, key)): Path<(String, String)>,
    body: Bytes,
) -> std::result::Result<Response, ApiError> {
    let dbnum = dbnum(&db)?;
    debug!(dbnum, key = %key, len = body.len(), "REST set");

    // A missing binding is a failure for writes, not a 404
    match state.bounded(state.store.set(dbnum, &key, body)).await {
        Ok(()) => Ok(ok()),
        Err(e) => {
            error!("REST set failed: {}", e);
            Err(ApiError::Internal(e.to_string()))
        }
    }
}

/// DELETE /:dbnum/:key
pub async fn del_value(
    State(state): State<AppState>,
    Path((db, key)): Path<(String, String)>,
) -> std::result::Result<Response, ApiError> {
    let dbnum = dbnum(&db)?;
    debug!(dbnum, key = %key, "REST del");

    state.bounded(state.store.del(dbnum, &key)).await?;
    Ok(ok())
}

/// GET /:dbnum/keys/:pattern
pub async fn keys(
    State(state): State<AppState>,
    Path((db, pattern)): Path<(String, String)>,
) -> std::result::Result<Response, ApiError> {
    let dbnum = dbnum(&db)?;
    let keys = state.bounded(state.store.keys(dbnum, &pattern)).await?;
    Ok(ok_with(json!(keys)))
}

/// Query parameters of the list endpoint
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    pub format: String,
    pub keys: String,
    #[serde(rename = "skipHeader")]
    pub skip_header: String,
}

impl ListParams {
    fn columns(&self) -> Vec<String> {
        self.keys
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn skip_header(&self) -> bool {
        matches!(
            self.skip_header.trim().to_ascii_lowercase().as_str(),
            "1" | "t" | "true" | "y" | "yes" | "on"
        )
    }
}

/// GET /:dbnum/list/:pattern
pub async fn list(
    State(state): State<AppState>,
    Path((db, pattern)): Path<(String, String)>,
    Query(params): Query<ListParams>,
) -> std::result::Result<Response, ApiError> {
    let dbnum = dbnum(&db)?;
    let format = ListFormat::parse(&params.format, params.skip_header())
        .ok_or_else(|| ApiError::BadRequest(format!("unsupported format: {}", params.format)))?;

    let records = state.bounded(state.store.list(dbnum, &pattern)).await?;
    debug!(dbnum, pattern = %pattern, count = records.len(), "REST list");

    let body = format
        .render(&records, &params.columns())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, format.content_type())], body).into_response())
}
