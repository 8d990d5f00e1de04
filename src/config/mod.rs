//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use cli::{
    BackendOverride, CliArgs, Command, LoggingOverrides, ServeArgs, ServeOverrides, SitemapArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "devhub";
const ENV_PREFIX: &str = "DEVHUB";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PAGE_SIZE: u64 = 10;
const DEFAULT_DEBOUNCE_MS: u64 = 300;
const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.1;
const DEFAULT_REVALIDATE_SECS: u64 = 3600;
const DEFAULT_DETAIL_CACHE_CAPACITY: u64 = 256;
const DEFAULT_PUBLIC_BASE_URL: &str = "https://devhub.xyz";
const DEFAULT_SITEMAP_OUTPUT_DIR: &str = "public";
const DEFAULT_SITEMAP_CACHE_HOURS: u64 = 24;
const DEFAULT_MAX_URLS_PER_FILE: u64 = 1000;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub backend: BackendSettings,
    pub listing: ListingSettings,
    pub detail: DetailSettings,
    pub sitemap: SitemapSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    base_url: Option<String>,
    pub timeout: Duration,
}

impl BackendSettings {
    /// Backend URL; unset is reported as invalid configuration.
    pub fn base_url(&self) -> Result<&str, LoadError> {
        self.base_url
            .as_deref()
            .ok_or_else(|| LoadError::invalid("backend.base_url", "must be set"))
    }
}

#[derive(Debug, Clone)]
pub struct ListingSettings {
    pub page_size: NonZeroUsize,
    pub debounce: Duration,
    /// Fraction of the sentinel that must be visible before the next page loads.
    pub visibility_threshold: f64,
}

#[derive(Debug, Clone)]
pub struct DetailSettings {
    pub revalidate: Duration,
    pub cache_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct SitemapSettings {
    pub public_base_url: String,
    pub output_dir: PathBuf,
    pub cache_ttl: Duration,
    pub max_urls_per_file: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Sitemap(args)) => raw.apply_sitemap_overrides(args),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    backend: RawBackendSettings,
    listing: RawListingSettings,
    detail: RawDetailSettings,
    sitemap: RawSitemapSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(size) = overrides.listing_page_size {
            self.listing.page_size = Some(size);
        }
        if let Some(seconds) = overrides.detail_revalidate_seconds {
            self.detail.revalidate_seconds = Some(seconds);
        }

        self.apply_backend_override(&overrides.backend);
        self.apply_logging_overrides(&overrides.logging);
    }

    fn apply_sitemap_overrides(&mut self, args: &SitemapArgs) {
        if let Some(dir) = args.output_dir.as_ref() {
            self.sitemap.output_dir = Some(dir.clone());
        }
        if let Some(url) = args.public_base_url.as_ref() {
            self.sitemap.public_base_url = Some(url.clone());
        }

        self.apply_backend_override(&args.backend);
        self.apply_logging_overrides(&args.logging);
    }

    fn apply_backend_override(&mut self, overrides: &BackendOverride) {
        if let Some(url) = overrides.backend_url.as_ref() {
            self.backend.base_url = Some(url.clone());
        }
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            backend,
            listing,
            detail,
            sitemap,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            backend: build_backend_settings(backend)?,
            listing: build_listing_settings(listing)?,
            detail: build_detail_settings(detail)?,
            sitemap: build_sitemap_settings(sitemap)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_backend_settings(backend: RawBackendSettings) -> Result<BackendSettings, LoadError> {
    let base_url = match backend.base_url.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(value) => {
            parse_http_url(value).map_err(|reason| LoadError::invalid("backend.base_url", reason))?;
            Some(value.to_string())
        }
    };

    let timeout_secs = backend
        .timeout_seconds
        .unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "backend.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(BackendSettings {
        base_url,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_listing_settings(listing: RawListingSettings) -> Result<ListingSettings, LoadError> {
    let page_size = non_zero_usize(
        listing.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        "listing.page_size",
    )?;

    let threshold = listing
        .visibility_threshold
        .unwrap_or(DEFAULT_VISIBILITY_THRESHOLD);
    if !(0.0..1.0).contains(&threshold) {
        return Err(LoadError::invalid(
            "listing.visibility_threshold",
            "must be in the range [0, 1)",
        ));
    }

    Ok(ListingSettings {
        page_size,
        debounce: Duration::from_millis(listing.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)),
        visibility_threshold: threshold,
    })
}

fn build_detail_settings(detail: RawDetailSettings) -> Result<DetailSettings, LoadError> {
    let revalidate_secs = detail.revalidate_seconds.unwrap_or(DEFAULT_REVALIDATE_SECS);
    let cache_capacity = non_zero_usize(
        detail
            .cache_capacity
            .unwrap_or(DEFAULT_DETAIL_CACHE_CAPACITY),
        "detail.cache_capacity",
    )?;

    Ok(DetailSettings {
        revalidate: Duration::from_secs(revalidate_secs),
        cache_capacity,
    })
}

fn build_sitemap_settings(sitemap: RawSitemapSettings) -> Result<SitemapSettings, LoadError> {
    let public_base_url = sitemap
        .public_base_url
        .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string());
    parse_http_url(&public_base_url)
        .map_err(|reason| LoadError::invalid("sitemap.public_base_url", reason))?;

    let output_dir = sitemap
        .output_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SITEMAP_OUTPUT_DIR));
    if output_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "sitemap.output_dir",
            "path must not be empty",
        ));
    }

    let cache_hours = sitemap.cache_hours.unwrap_or(DEFAULT_SITEMAP_CACHE_HOURS);
    let max_urls_per_file = non_zero_usize(
        sitemap
            .max_urls_per_file
            .unwrap_or(DEFAULT_MAX_URLS_PER_FILE),
        "sitemap.max_urls_per_file",
    )?;

    Ok(SitemapSettings {
        public_base_url: public_base_url.trim_end_matches('/').to_string(),
        output_dir,
        cache_ttl: Duration::from_secs(cache_hours.saturating_mul(3600)),
        max_urls_per_file,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBackendSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawListingSettings {
    page_size: Option<u64>,
    debounce_ms: Option<u64>,
    visibility_threshold: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDetailSettings {
    revalidate_seconds: Option<u64>,
    cache_capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSitemapSettings {
    public_base_url: Option<String>,
    output_dir: Option<PathBuf>,
    cache_hours: Option<u64>,
    max_urls_per_file: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_http_url(value: &str) -> Result<Url, String> {
    let url = Url::parse(value).map_err(|err| format!("invalid url `{value}`: {err}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme `{other}`")),
    }
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
