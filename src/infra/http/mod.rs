mod middleware;
mod pages;
mod proxy;
mod sitemap;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{StatusCode, header::CONTENT_TYPE},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::application::{
    backend::ListingBackend, detail::DetailService, listing::ListingService,
    sitemap::SitemapService,
};

pub use middleware::{REQUEST_ID_HEADER, RequestContext};

#[derive(Clone)]
pub struct HttpState {
    pub backend: Arc<dyn ListingBackend>,
    pub listings: Arc<ListingService>,
    pub details: Arc<DetailService>,
    pub sitemap: Arc<SitemapService>,
}

pub fn build_router(state: HttpState) -> Router {
    let api = Router::new()
        .route("/api/sitemap", get(sitemap::regenerate))
        .route("/api/{listing}", get(proxy::forward));

    let pages = Router::new()
        .route("/hackathons", get(pages::hackathons))
        .route("/jobs", get(pages::jobs))
        .route("/resources", get(pages::resources))
        .route("/hackathons/{slug}/{id}", get(pages::hackathon_detail))
        .route("/jobs/{slug}/{id}", get(pages::job_detail))
        .route("/resources/{slug}/{id}", get(pages::resource_detail));

    let files = Router::new()
        .route("/robots.txt", get(sitemap::robots_txt))
        .route("/{file}", get(sitemap::serve_file));

    api.merge(pages)
        .merge(files)
        .with_state(state)
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
}

fn xml_response(body: String) -> Response {
    text_response(body, "application/xml")
}

fn plain_response(body: String) -> Response {
    text_response(body, "text/plain; charset=utf-8")
}

fn text_response(body: String, content_type: &str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
