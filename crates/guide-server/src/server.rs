use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{MatchedPath, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn, Span};

use guide_core::enrich::EnrichedInput;

use crate::error::GuideError;
use crate::service::{GuideResult, GuideService};

pub type AppState = Arc<GuideService>;

const GENERATION_FAILED: &str = "Failed to generate guide. Please try again later.";

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/", get(api_index))
        .route("/health", get(health))
        .route("/api/guide", post(guide))
        .route("/api/validate", post(validate))
        .with_state(service)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let matched_path = request
                        .extensions()
                        .get::<MatchedPath>()
                        .map(MatchedPath::as_str)
                        .unwrap_or(request.uri().path());
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %matched_path,
                    )
                })
                .on_request(|_request: &Request<_>, _span: &Span| {})
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, _span: &Span| {
                        let status = response.status().as_u16();
                        if status >= 500 {
                            tracing::error!(status, latency_ms = %latency.as_millis(), "request failed with server error");
                        } else {
                            tracing::info!(status, latency_ms = %latency.as_millis(), "request completed");
                        }
                    },
                ),
        )
}

#[derive(Debug, Deserialize)]
struct GuideBody {
    #[serde(rename = "type")]
    category: Option<Value>,
    input: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ValidateBody {
    input: Option<Value>,
    #[serde(rename = "type")]
    category: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateResponse {
    valid: bool,
    has_wowhead_data: bool,
    has_item_id: bool,
    item_data: EnrichedInput,
    can_process: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct ValidateFailure {
    valid: bool,
    message: String,
}

impl IntoResponse for GuideError {
    fn into_response(self) -> Response {
        let status = match &self {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            GuideError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &self {
            GuideError::Generation(e) => {
                error!(error = %e, "guide generation failed");
                GENERATION_FAILED.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

async fn guide(
    State(service): State<AppState>,
    body: Result<Json<GuideBody>, JsonRejection>,
) -> Result<Json<GuideResult>, GuideError> {
    let Json(body) = body.map_err(|rejection| {
        warn!(error = %rejection, "unreadable guide request body");
        GuideError::MissingFields
    })?;
    if let Some(category) = body.category.as_ref().filter(|v| !v.is_null() && !v.is_string()) {
        return Err(GuideError::InvalidCategory(category.to_string()));
    }
    let request = GuideService::validate(text_field(&body.category), text_field(&body.input))?;
    let result = service.generate(request).await?;
    Ok(Json(result))
}

async fn validate(
    State(service): State<AppState>,
    body: Result<Json<ValidateBody>, JsonRejection>,
) -> Result<Json<ValidateResponse>, (StatusCode, Json<ValidateFailure>)> {
    let Json(body) = body.map_err(|rejection| {
        validate_failure(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;
    let Some(input) = text_field(&body.input).filter(|s| !s.trim().is_empty()) else {
        return Err(validate_failure(
            StatusCode::BAD_REQUEST,
            "Missing required field: input",
        ));
    };

    let item_data = service.preview(input, text_field(&body.category)).await;
    if item_data.fallback {
        let message = item_data
            .error
            .clone()
            .unwrap_or_else(|| "Failed to validate input".to_string());
        return Err(validate_failure(StatusCode::INTERNAL_SERVER_ERROR, message));
    }

    Ok(Json(ValidateResponse {
        valid: true,
        has_wowhead_data: item_data.summary.has_wowhead_data,
        has_item_id: item_data.summary.has_item_id,
        can_process: item_data.summary.can_generate_guide,
        message: item_data.summary.recommended_action.clone(),
        item_data,
    }))
}

// Non-string JSON values count as absent.
fn text_field(value: &Option<Value>) -> Option<&str> {
    value.as_ref().and_then(Value::as_str)
}

fn validate_failure(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ValidateFailure>) {
    (
        status,
        Json(ValidateFailure {
            valid: false,
            message: message.into(),
        }),
    )
}

async fn health(State(service): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "OK", "model": service.model() }))
}

async fn api_index() -> Json<Value> {
    Json(json!({
        "name": "WoW Collection Helper API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /api/guide": {
                "description": "Generate a step-by-step acquisition guide",
                "body": { "type": "mount | toy | pet | decor", "input": "item name or Wowhead URL" }
            },
            "POST /api/validate": {
                "description": "Preview item enrichment without calling the model",
                "body": { "input": "item name or Wowhead URL", "type": "optional category" }
            },
            "GET /health": { "description": "Health check with the configured model" }
        }
    }))
}
