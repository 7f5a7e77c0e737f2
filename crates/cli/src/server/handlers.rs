//! Route handlers.

use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use firegpt_core::AppError;
use firegpt_llm::discover_models;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::server::error::ApiError;
use crate::state::AppState;

/// Multipart field carrying an uploaded document.
const UPLOAD_FIELD: &str = "file";

type ApiResult = Result<Json<Value>, ApiError>;

pub async fn ask(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult {
    let body = parse_body(&body)?;
    let query = body
        .get("query")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::InvalidInput("No query provided.".to_string()))?;

    let answer = state.pipeline.ask(query).await?;

    let mut response = json!({ "response": answer.text });
    if let Some(location) = answer.location {
        response["location"] = json!(location);
    }
    Ok(Json(response))
}

pub async fn plan_action(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult {
    let body = parse_body(&body)?;
    let lat = coordinate_field(&body, "latitude")?;
    let lon = coordinate_field(&body, "longitude")?;

    let plan = state.pipeline.plan_action(lat, lon).await?;
    Ok(Json(json!(plan)))
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> ApiResult {
    let models: Vec<String> = discover_models(&state.models_dir)?
        .iter()
        .filter_map(|p| p.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .collect();
    let current = state.pipeline.registry().current().await;

    Ok(Json(json!({ "models": models, "current": current })))
}

pub async fn set_model(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult {
    let body = parse_body(&body)?;
    let requested = body
        .get("model")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::InvalidInput("No model provided.".to_string()))?;

    let path = state.model_path(requested);
    let current = state.pipeline.registry().swap(&path).await?;

    Ok(Json(json!({ "success": true, "current": current })))
}

pub async fn upload_doc(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let mut multipart = multipart
        .map_err(|e| AppError::InvalidInput(format!("Expected a multipart upload: {}", e)))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::InvalidInput("Uploaded file has no name.".to_string()))?;
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let result = state.ingestor.ingest(&filename, &bytes).await?;
        return Ok(Json(json!({ "success": true, "text": result.text })));
    }

    Err(AppError::InvalidInput("No file uploaded.".to_string()).into())
}

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult {
    let store = Arc::clone(state.pipeline.store());
    let stats = tokio::task::spawn_blocking(move || store.stats())
        .await
        .map_err(|e| AppError::Knowledge(format!("Stats task failed: {}", e)))??;
    let model = state.pipeline.registry().current().await;

    Ok(Json(json!({
        "status": "ok",
        "model": model,
        "chunks": stats.chunks_count
    })))
}

fn parse_body(body: &[u8]) -> Result<Value, AppError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidInput(format!("Request body must be JSON: {}", e)))?;
    if !value.is_object() {
        return Err(AppError::InvalidInput(
            "Request body must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}

/// Numeric field, also accepting numbers sent as strings.
fn coordinate_field(body: &Value, key: &str) -> Result<f64, AppError> {
    let value = match body.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::InvalidInput(format!("'{}' must be a number.", key)))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::InvalidInput(format!("Malformed upload: {}", err.body_text()))
    }
}
