use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the leafline binary.
#[derive(Debug, Parser)]
#[command(
    name = "leafline",
    version,
    about = "Product image generation cache and partner API health probe"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "LEAFLINE_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Probe the partner API once and print the report.
    Health(HealthArgs),
    /// Resolve (and optionally generate) the image for one product.
    Image(Box<ImageArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
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
pub struct PartnerOverrides {
    /// Override the partner API base URL.
    #[arg(long = "partner-api-url", value_name = "URL")]
    pub partner_api_url: Option<String>,

    /// Override the health probe timeout.
    #[arg(long = "partner-timeout-seconds", value_name = "SECONDS")]
    pub partner_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StorageOverrides {
    /// Override the storage service base URL.
    #[arg(long = "storage-url", value_name = "URL")]
    pub storage_url: Option<String>,

    /// Override the bucket holding generated images.
    #[arg(long = "storage-bucket", value_name = "NAME")]
    pub storage_bucket: Option<String>,

    /// Override the functions host base URL.
    #[arg(long = "gateway-url", value_name = "URL")]
    pub gateway_url: Option<String>,

    /// Override the generation timeout.
    #[arg(long = "gateway-timeout-seconds", value_name = "SECONDS")]
    pub gateway_timeout_seconds: Option<u64>,

    /// Generate automatically when no cached image exists.
    #[arg(
        long = "images-auto-generate",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub images_auto_generate: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub partner: PartnerOverrides,

    #[command(flatten)]
    pub storage: StorageOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct HealthArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub partner: PartnerOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct ImageArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub storage: StorageOverrides,

    /// Product identifier.
    #[arg(value_name = "PRODUCT_ID")]
    pub product_id: String,

    /// Product display name.
    #[arg(long = "name", value_name = "NAME")]
    pub name: String,

    /// Address of the product's original image.
    #[arg(long = "original-url", value_name = "URL")]
    pub original_url: Option<String>,

    /// Trigger generation when no cached image exists.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub generate: bool,
}
