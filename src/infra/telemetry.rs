use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, filter::Directive, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Connection-level chatter from the HTTP stack, kept out of `debug` output
/// unless `RUST_LOG` is set.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=info", "hyper_util=info", "reqwest=info", "h2=info"];

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let mut env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
        for directive in QUIET_DEPENDENCIES {
            let directive = directive
                .parse::<Directive>()
                .map_err(|err| InfraError::telemetry(format!("invalid log directive: {err}")))?;
            env_filter = env_filter.add_directive(directive);
        }
    }

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "devhub_backend_requests_total",
            Unit::Count,
            "Requests sent to the content backend, by endpoint."
        );
        describe_counter!(
            "devhub_backend_failures_total",
            Unit::Count,
            "Backend requests that failed in transport, status or decoding."
        );
        describe_counter!(
            "devhub_scroll_stale_pages_total",
            Unit::Count,
            "Pages discarded because the filter key changed while they were in flight."
        );
        describe_counter!(
            "devhub_listing_fallbacks_total",
            Unit::Count,
            "Listing page loads that fell back to an empty initial state."
        );
        describe_counter!(
            "devhub_sitemap_urls_total",
            Unit::Count,
            "URLs written across generated sitemap files."
        );
    });
}
