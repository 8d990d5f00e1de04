use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use devhub::{
    application::{
        backend::ListingBackend,
        detail::DetailService,
        error::AppError,
        listing::ListingService,
        sitemap::{SitemapOptions, SitemapService},
    },
    config,
    infra::{
        backend::HttpBackend,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Sitemap(_) => run_sitemap(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let backend = init_backend(&settings)?;
    let state = HttpState {
        backend: Arc::clone(&backend),
        listings: Arc::new(
            ListingService::new(Arc::clone(&backend), settings.listing.page_size.get())
                .with_session_timing(
                    settings.listing.debounce,
                    settings.listing.visibility_threshold,
                ),
        ),
        details: Arc::new(DetailService::new(
            Arc::clone(&backend),
            settings.detail.revalidate,
            settings.detail.cache_capacity,
        )),
        sitemap: Arc::new(sitemap_service(backend, &settings)),
    };

    serve_http(&settings, state).await
}

async fn run_sitemap(settings: config::Settings) -> Result<(), AppError> {
    let backend = init_backend(&settings)?;
    let report = sitemap_service(backend, &settings).generate().await?;
    info!(
        files = report.files.len(),
        urls = report.urls,
        degraded = report.degraded,
        output_dir = %settings.sitemap.output_dir.display(),
        "sitemap generation finished"
    );
    Ok(())
}

fn init_backend(settings: &config::Settings) -> Result<Arc<dyn ListingBackend>, AppError> {
    let base_url = settings
        .backend
        .base_url()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;
    let backend = HttpBackend::new(base_url, settings.backend.timeout)?;
    info!(base_url = %backend.base_url(), "backend client ready");
    Ok(Arc::new(backend))
}

fn sitemap_service(backend: Arc<dyn ListingBackend>, settings: &config::Settings) -> SitemapService {
    SitemapService::new(
        backend,
        SitemapOptions {
            public_base_url: settings.sitemap.public_base_url.clone(),
            output_dir: settings.sitemap.output_dir.clone(),
            cache_ttl: settings.sitemap.cache_ttl,
            max_urls_per_file: settings.sitemap.max_urls_per_file.get(),
        },
    )
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    let (stop_tx, stop_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = stop_tx.send(true);
        })
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        () = drain_deadline(stop_rx, settings.server.graceful_shutdown) => {
            warn!(
                grace_secs = settings.server.graceful_shutdown.as_secs(),
                "connections still open after graceful shutdown window; exiting"
            );
            Ok(())
        }
    }
}

async fn drain_deadline(mut stop: watch::Receiver<bool>, grace: Duration) {
    if stop.wait_for(|stopping| *stopping).await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received; draining connections");
}
