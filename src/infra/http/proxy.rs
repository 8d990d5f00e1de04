//! `/api/{listing}`: the browser-facing proxy the infinite scroll fetches from.

use axum::{
    Json,
    extract::{Path, RawQuery, State},
    http::StatusCode,
};
use serde_json::Value;

use crate::{application::error::HttpError, domain::types::ListingKind};

use super::HttpState;

const SOURCE: &str = "infra::http::proxy";

/// Relay the raw query string to the backend and its JSON body back unchanged.
pub(super) async fn forward(
    State(state): State<HttpState>,
    Path(listing): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, HttpError> {
    let kind: ListingKind = listing
        .parse()
        .map_err(|err| HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Not found", &err))?;

    state
        .backend
        .list(kind, query.as_deref().unwrap_or_default())
        .await
        .map(Json)
        .map_err(|err| {
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to fetch {kind}"),
                &err,
            )
        })
}

