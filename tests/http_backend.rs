use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use devhub::application::backend::{BackendError, ListingBackend};
use devhub::application::detail::{DetailError, DetailService};
use devhub::domain::entities::Hackathon;
use devhub::domain::error::DomainError;
use devhub::domain::types::ListingKind;
use devhub::infra::backend::HttpBackend;
use httpmock::MockServer;
use serde_json::json;

fn backend(server: &MockServer) -> HttpBackend {
    HttpBackend::new(&server.url("/v1"), Duration::from_secs(5)).expect("backend")
}

#[tokio::test]
async fn listing_query_is_forwarded_under_the_base_path() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/v1/jobs")
            .query_param("category", "5,7")
            .query_param("limit", "10")
            .query_param("cursor", "abc");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "data": [{ "id": 1 }], "nextCursor": "def", "hasMore": true }));
    });

    let body = backend(&server)
        .list(ListingKind::Jobs, "category=5%2C7&limit=10&cursor=abc")
        .await
        .expect("listing");
    mock.assert();
    assert_eq!(body["nextCursor"], "def");
    assert_eq!(body["data"][0]["id"], 1);
}

#[tokio::test]
async fn non_success_status_is_reported_with_its_code() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/v1/resources/404");
        then.status(404).body("missing");
    });
    server.mock(|when, then| {
        when.method("GET").path("/v1/resources/500");
        then.status(500).body("boom");
    });

    let client = backend(&server);
    let missing = client
        .detail(ListingKind::Resources, 404)
        .await
        .expect_err("404");
    assert!(missing.is_not_found());

    let broken = client
        .detail(ListingKind::Resources, 500)
        .await
        .expect_err("500");
    assert!(matches!(broken, BackendError::Status { status: 500, .. }));
    assert!(!broken.is_not_found());
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/v1/hackathons");
        then.status(200)
            .header("content-type", "application/json")
            .body("{not json");
    });

    let err = backend(&server)
        .list(ListingKind::Hackathons, "")
        .await
        .expect_err("decode");
    assert!(matches!(err, BackendError::Decode { .. }));
}

#[tokio::test]
async fn facets_and_active_hackathons_decode_envelopes() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/v1/jobs/getjobcategories");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "data": [{ "id": 5, "name": "Engineering" }] }));
    });
    server.mock(|when, then| {
        when.method("GET").path("/v1/hackathons/active");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([{ "id": 3, "title": "Live Now" }]));
    });

    let client = backend(&server);
    let source = ListingKind::Jobs
        .facet_sources()
        .iter()
        .find(|source| source.endpoint == "jobs/getjobcategories")
        .expect("categories facet");
    let options = client.facets(source).await.expect("facets");
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].name, "Engineering");

    let active = client.active_hackathons().await.expect("active");
    assert_eq!(active[0].title, "Live Now");
}

#[tokio::test]
async fn detail_records_are_cached_until_invalidated() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET").path("/v1/hackathons/7");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "data": [{ "id": 7, "title": "Build & Ship" }] }));
    });

    let details = DetailService::new(
        Arc::new(backend(&server)),
        Duration::from_secs(3600),
        NonZeroUsize::new(4).expect("capacity"),
    );

    let page = details
        .load::<Hackathon>("build-ship", 7)
        .await
        .expect("detail");
    assert_eq!(page.path, "/hackathons/build-ship/7");
    details
        .load::<Hackathon>("build-ship", 7)
        .await
        .expect("cached detail");
    assert_eq!(mock.hits(), 1);

    details.invalidate();
    details
        .load::<Hackathon>("build-ship", 7)
        .await
        .expect("refetched detail");
    assert_eq!(mock.hits(), 2);
}

#[tokio::test]
async fn missing_detail_is_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/v1/jobs/9");
        then.status(404);
    });
    server.mock(|when, then| {
        when.method("GET").path("/v1/jobs/10");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "data": [] }));
    });

    let details = DetailService::new(
        Arc::new(backend(&server)),
        Duration::from_secs(3600),
        NonZeroUsize::new(4).expect("capacity"),
    );
    for id in [9, 10] {
        let err = details
            .load::<devhub::domain::entities::Job>("anything", id)
            .await
            .expect_err("missing");
        assert!(matches!(err, DetailError::Domain(DomainError::NotFound { .. })));
    }
}
