use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the DevHub binary.
#[derive(Debug, Parser)]
#[command(name = "devhub", version, about = "DevHub listing aggregator")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "DEVHUB_CONFIG_FILE", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Generate sitemap files once and exit.
    Sitemap(SitemapArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct BackendOverride {
    /// Override the backend API base URL.
    #[arg(long = "backend-url", value_name = "URL")]
    pub backend_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub backend: BackendOverride,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the listing page size.
    #[arg(long = "listing-page-size", value_name = "COUNT")]
    pub listing_page_size: Option<u64>,

    /// Override how long detail records are served from memory.
    #[arg(long = "detail-revalidate-seconds", value_name = "SECONDS")]
    pub detail_revalidate_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SitemapArgs {
    #[command(flatten)]
    pub backend: BackendOverride,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Override the directory sitemap files are written to.
    #[arg(long = "output-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,

    /// Override the origin used in sitemap URLs.
    #[arg(long = "public-base-url", value_name = "URL")]
    pub public_base_url: Option<String>,
}
