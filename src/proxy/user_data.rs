//! Per-user document save and load.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;

use super::server::AppState;
use crate::error::Error;
use crate::storage::{blob_key, StorageError};

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct LoadQuery {
    #[serde(default)]
    pub email: Option<String>,
}

fn valid_email(email: Option<&str>) -> Result<&str, Error> {
    match email {
        Some(email) if email.contains('@') => Ok(email),
        _ => Err(Error::InvalidEmail),
    }
}

fn storage_error(action: &'static str, e: StorageError) -> Error {
    tracing::error!(error = %e, action, "Blob store request failed");
    Error::Storage {
        action,
        details: e.to_string(),
    }
}

/// Handle POST /api/save-user-data
pub async fn save_user_data(
    State(state): State<AppState>,
    body: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(request) = body.map_err(|rejection| Error::BadRequest(rejection.body_text()))?;
    let email = valid_email(request.email.as_deref())?;
    let key = blob_key(email);

    let payload = serde_json::to_vec(&request.data)
        .map_err(|e| storage_error("save", StorageError::Encode(e)))?;

    let blob = state
        .blobs
        .put(&key, Bytes::from(payload))
        .await
        .map_err(|e| storage_error("save", e))?;

    tracing::info!(pathname = %blob.pathname, "Saved user data");

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Data saved successfully to cloud",
        "url": blob.url,
    })))
}

/// Handle GET /api/load-user-data?email=...
pub async fn load_user_data(
    State(state): State<AppState>,
    query: Result<Query<LoadQuery>, QueryRejection>,
) -> Result<impl IntoResponse, Error> {
    let Query(query) = query.map_err(|rejection| Error::BadRequest(rejection.body_text()))?;
    let email = valid_email(query.email.as_deref())?;
    let key = blob_key(email);

    let blobs = state
        .blobs
        .list()
        .await
        .map_err(|e| storage_error("load", e))?;

    let Some(blob) = blobs.into_iter().find(|b| b.pathname == key) else {
        tracing::debug!(pathname = %key, "No stored user data");
        return Ok(Json(serde_json::json!({
            "success": true,
            "data": null,
            "message": "No data found for this email",
        })));
    };

    let content = state
        .blobs
        .fetch(&blob.url)
        .await
        .map_err(|e| storage_error("load", e))?;
    let data: serde_json::Value = serde_json::from_slice(&content)
        .map_err(|e| storage_error("load", StorageError::Encode(e)))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": data,
    })))
}
