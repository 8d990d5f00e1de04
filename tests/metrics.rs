mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use devhub::application::backend::ListingBackend;
use devhub::application::listing::ListingService;
use devhub::application::sitemap::{SitemapOptions, SitemapService};
use devhub::domain::entities::Job;
use devhub::domain::types::ListingKind;
use devhub::infra::backend::HttpBackend;
use devhub::infra::telemetry;
use httpmock::MockServer;
use metrics_util::debugging::DebuggingRecorder;
use tempfile::TempDir;

use support::{FakeBackend, jobs};

#[tokio::test]
async fn services_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/jobs");
        then.status(503);
    });
    let http = HttpBackend::new(&server.base_url(), Duration::from_secs(5)).expect("backend");
    http.list(ListingKind::Jobs, "limit=10")
        .await
        .expect_err("backend unavailable");

    let fake = Arc::new(FakeBackend::new().with_items(ListingKind::Jobs, jobs(1, 3, "1")));
    fake.set_failing(true);
    let listing = ListingService::new(fake.clone(), 10)
        .initial::<Job>(Some("keyword=rust"))
        .await;
    assert!(listing.items.is_empty());

    fake.set_failing(false);
    let dir = TempDir::new().expect("temp dir");
    SitemapService::new(
        fake,
        SitemapOptions {
            public_base_url: "https://devhub.xyz".into(),
            output_dir: dir.path().to_path_buf(),
            cache_ttl: Duration::from_secs(60),
            max_urls_per_file: 100,
        },
    )
    .generate()
    .await
    .expect("sitemap");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for metric in [
        "devhub_backend_requests_total",
        "devhub_backend_failures_total",
        "devhub_listing_fallbacks_total",
        "devhub_sitemap_urls_total",
    ] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
