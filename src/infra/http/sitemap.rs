use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::info;

use crate::application::error::HttpError;

use super::{HttpState, plain_response, xml_response};

const SOURCE: &str = "infra::http::sitemap";

/// Regenerate every sitemap file and drop cached detail records.
pub(super) async fn regenerate(State(state): State<HttpState>) -> Result<Json<Value>, HttpError> {
    let report = state.sitemap.generate().await.map_err(HttpError::from)?;
    state.details.invalidate();
    info!(
        target = SOURCE,
        files = report.files.len(),
        urls = report.urls,
        degraded = report.degraded,
        "sitemap regenerated on request"
    );
    Ok(Json(json!({ "message": "Sitemap generated and revalidated" })))
}

pub(super) async fn serve_file(
    State(state): State<HttpState>,
    Path(file): Path<String>,
) -> Response {
    match state.sitemap.read_file(&file).await {
        Ok(Some(body)) => xml_response(body),
        Ok(None) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Not found",
            format!("no generated file named `{file}`"),
        )
        .into_response(),
        Err(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read sitemap",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn robots_txt(State(state): State<HttpState>) -> Response {
    plain_response(state.sitemap.robots_txt())
}
