use axum::{
    Json,
    extract::{Path, RawQuery, State},
};
use serde::de::DeserializeOwned;

use crate::{
    application::{detail::DetailPage, error::HttpError, listing::InitialListing},
    domain::entities::{Hackathon, Job, Listed, Resource},
};

use super::HttpState;

pub(super) async fn hackathons(
    State(state): State<HttpState>,
    RawQuery(query): RawQuery,
) -> Json<InitialListing<Hackathon>> {
    listing(&state, query).await
}

pub(super) async fn jobs(
    State(state): State<HttpState>,
    RawQuery(query): RawQuery,
) -> Json<InitialListing<Job>> {
    listing(&state, query).await
}

pub(super) async fn resources(
    State(state): State<HttpState>,
    RawQuery(query): RawQuery,
) -> Json<InitialListing<Resource>> {
    listing(&state, query).await
}

pub(super) async fn hackathon_detail(
    State(state): State<HttpState>,
    Path((slug, id)): Path<(String, i64)>,
) -> Result<Json<DetailPage<Hackathon>>, HttpError> {
    detail(&state, &slug, id).await
}

pub(super) async fn job_detail(
    State(state): State<HttpState>,
    Path((slug, id)): Path<(String, i64)>,
) -> Result<Json<DetailPage<Job>>, HttpError> {
    detail(&state, &slug, id).await
}

pub(super) async fn resource_detail(
    State(state): State<HttpState>,
    Path((slug, id)): Path<(String, i64)>,
) -> Result<Json<DetailPage<Resource>>, HttpError> {
    detail(&state, &slug, id).await
}

async fn listing<T>(state: &HttpState, query: Option<String>) -> Json<InitialListing<T>>
where
    T: Listed + DeserializeOwned,
{
    Json(state.listings.initial::<T>(query.as_deref()).await)
}

async fn detail<T>(state: &HttpState, slug: &str, id: i64) -> Result<Json<DetailPage<T>>, HttpError>
where
    T: Listed + DeserializeOwned,
{
    state
        .details
        .load::<T>(slug, id)
        .await
        .map(Json)
        .map_err(HttpError::from)
}
