use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use mdpress_api_types::{
    ApiIndex, ConvertData, ConvertRequest, HealthResponse, StatsRequest, StatsResponse, SuccessEnvelope,
    TemplateSummary,
};

use crate::application::convert::{ConvertTarget, template_summary};
use crate::application::stats::text_stats;

use super::error::ApiError;
use super::state::ApiState;

pub async fn convert_html(
    State(state): State<ApiState>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    convert(state, ConvertTarget::Html, payload).await
}

pub async fn convert_email(
    State(state): State<ApiState>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    convert(state, ConvertTarget::Email, payload).await
}

pub async fn convert_wechat(
    State(state): State<ApiState>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    convert(state, ConvertTarget::Wechat, payload).await
}

pub async fn convert_plain(
    State(state): State<ApiState>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    convert(state, ConvertTarget::Plain, payload).await
}

async fn convert(
    state: ApiState,
    target: ConvertTarget,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<SuccessEnvelope<ConvertData>>, ApiError> {
    let Json(request) = payload?;
    let service = state.convert;

    // Rendering is synchronous and may wait on the diagram CLI.
    let conversion = tokio::task::spawn_blocking(move || service.convert(target, &request))
        .await
        .map_err(|err| ApiError::internal(format!("conversion task failed: {err}")))??;

    Ok(Json(SuccessEnvelope::new(ConvertData {
        html: conversion.html,
        template: conversion.template,
    })))
}

pub async fn list_templates(State(state): State<ApiState>) -> impl IntoResponse {
    let templates: Vec<TemplateSummary> = state
        .convert
        .catalog()
        .iter()
        .map(template_summary)
        .collect();
    Json(SuccessEnvelope::new(templates))
}

pub async fn stats(
    payload: Result<Json<StatsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let markdown = request
        .markdown
        .ok_or_else(|| ApiError::bad_request("markdown is required"))?;
    let stats: StatsResponse = text_stats(&markdown).into();
    Ok(Json(SuccessEnvelope::new(stats)))
}

const ENDPOINTS: [(&str, &str); 8] = [
    ("GET /api", "List the available endpoints"),
    ("GET /health", "Service health and version"),
    ("POST /api/convert/html", "Convert Markdown to a styled HTML document"),
    ("POST /api/convert/email", "Convert Markdown to email-compatible HTML"),
    ("POST /api/convert/wechat", "Convert Markdown to WeChat-compatible HTML"),
    ("POST /api/convert/plain", "Convert Markdown to plain HTML"),
    ("GET /api/convert/templates", "List the available templates"),
    ("POST /api/stats", "Text statistics for a Markdown document"),
];

pub async fn api_index() -> impl IntoResponse {
    Json(ApiIndex {
        name: "mdpress API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: ENDPOINTS
            .iter()
            .map(|(route, summary)| (route.to_string(), summary.to_string()))
            .collect(),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("API endpoint not found")
}

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
