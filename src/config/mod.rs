//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::health::PartnerCredentials;

pub use cli::{
    CliArgs, Command, HealthArgs, ImageArgs, LoggingOverrides, PartnerOverrides, ServeArgs,
    ServeOverrides, StorageOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "leafline";
const ENV_PREFIX: &str = "LEAFLINE";
const PARTNER_SECRET_ENV_PREFIX: &str = "DRGREEN";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_BUCKET: &str = "product-images";
const DEFAULT_STORAGE_PROBE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_GATEWAY_FUNCTION: &str = "generate-product-image";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 120;
const DEFAULT_PARTNER_API_URL: &str = "https://api.drgreennft.com/api/v1";
const DEFAULT_PARTNER_TIMEOUT_SECS: u64 = 10;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub gateway: GatewaySettings,
    pub partner: PartnerSettings,
    pub images: ImageSettings,
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
pub struct StorageSettings {
    /// Required by every command that touches images.
    pub url: Option<Url>,
    pub bucket: String,
    pub probe_timeout: Duration,
}

#[derive(Clone)]
pub struct GatewaySettings {
    /// Falls back to the storage URL when unset.
    pub url: Option<Url>,
    pub token: Option<String>,
    pub function: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("function", &self.function)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PartnerSettings {
    pub api_url: Url,
    pub timeout: Duration,
    pub credentials: PartnerCredentials,
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub auto_generate: bool,
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

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.partner.apply_secrets(partner_secrets_from_env()?);

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Health(args)) => {
            raw.apply_logging_overrides(&args.logging);
            raw.apply_partner_overrides(&args.partner);
        }
        Some(Command::Image(args)) => {
            raw.apply_logging_overrides(&args.logging);
            raw.apply_storage_overrides(&args.storage);
        }
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

/// `DRGREEN_API_KEY` and `DRGREEN_PRIVATE_KEY`, read under their deployed names.
fn partner_secrets_from_env() -> Result<RawPartnerSecrets, LoadError> {
    let secrets = Config::builder()
        .add_source(Environment::with_prefix(PARTNER_SECRET_ENV_PREFIX))
        .build()?
        .try_deserialize()?;
    Ok(secrets)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    storage: RawStorageSettings,
    gateway: RawGatewaySettings,
    partner: RawPartnerSettings,
    images: RawImageSettings,
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
        self.apply_logging_overrides(&overrides.logging);
        self.apply_partner_overrides(&overrides.partner);
        self.apply_storage_overrides(&overrides.storage);
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_partner_overrides(&mut self, overrides: &PartnerOverrides) {
        if let Some(url) = overrides.partner_api_url.as_ref() {
            self.partner.api_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.partner_timeout_seconds {
            self.partner.timeout_seconds = Some(seconds);
        }
    }

    fn apply_storage_overrides(&mut self, overrides: &StorageOverrides) {
        if let Some(url) = overrides.storage_url.as_ref() {
            self.storage.url = Some(url.clone());
        }
        if let Some(bucket) = overrides.storage_bucket.as_ref() {
            self.storage.bucket = Some(bucket.clone());
        }
        if let Some(url) = overrides.gateway_url.as_ref() {
            self.gateway.url = Some(url.clone());
        }
        if let Some(seconds) = overrides.gateway_timeout_seconds {
            self.gateway.timeout_seconds = Some(seconds);
        }
        if let Some(auto) = overrides.images_auto_generate {
            self.images.auto_generate = Some(auto);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            storage,
            gateway,
            partner,
            images,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let storage = build_storage_settings(storage)?;
        let gateway = build_gateway_settings(gateway, storage.url.as_ref())?;
        let partner = build_partner_settings(partner)?;
        let images = ImageSettings {
            auto_generate: images.auto_generate.unwrap_or(false),
        };

        Ok(Self {
            server,
            logging,
            storage,
            gateway,
            partner,
            images,
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

    let graceful_shutdown = positive_seconds(
        server.graceful_shutdown_seconds,
        DEFAULT_GRACEFUL_SHUTDOWN_SECS,
        "server.graceful_shutdown_seconds",
    )?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
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

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let url = parse_optional_url(storage.url, "storage.url")?;
    let bucket = storage
        .bucket
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_BUCKET.to_string());
    if bucket.is_empty() {
        return Err(LoadError::invalid("storage.bucket", "must not be empty"));
    }

    let probe_timeout = positive_seconds(
        storage.probe_timeout_seconds,
        DEFAULT_STORAGE_PROBE_TIMEOUT_SECS,
        "storage.probe_timeout_seconds",
    )?;

    Ok(StorageSettings {
        url,
        bucket,
        probe_timeout,
    })
}

fn build_gateway_settings(
    gateway: RawGatewaySettings,
    storage_url: Option<&Url>,
) -> Result<GatewaySettings, LoadError> {
    let url = parse_optional_url(gateway.url, "gateway.url")?.or_else(|| storage_url.cloned());
    let token = non_blank(gateway.token);
    let function = gateway
        .function
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_GATEWAY_FUNCTION.to_string());
    if function.is_empty() {
        return Err(LoadError::invalid("gateway.function", "must not be empty"));
    }

    let timeout = positive_seconds(
        gateway.timeout_seconds,
        DEFAULT_GATEWAY_TIMEOUT_SECS,
        "gateway.timeout_seconds",
    )?;

    Ok(GatewaySettings {
        url,
        token,
        function,
        timeout,
    })
}

fn build_partner_settings(partner: RawPartnerSettings) -> Result<PartnerSettings, LoadError> {
    let api_url = match non_blank(partner.api_url) {
        Some(value) => parse_url(&value, "partner.api_url")?,
        None => parse_url(DEFAULT_PARTNER_API_URL, "partner.api_url")?,
    };

    let timeout = positive_seconds(
        partner.timeout_seconds,
        DEFAULT_PARTNER_TIMEOUT_SECS,
        "partner.timeout_seconds",
    )?;

    // Blank secrets stay blank; the probe reports them as missing.
    let credentials = PartnerCredentials::new(partner.api_key, partner.private_key);

    Ok(PartnerSettings {
        api_url,
        timeout,
        credentials,
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
struct RawStorageSettings {
    url: Option<String>,
    bucket: Option<String>,
    probe_timeout_seconds: Option<u64>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawGatewaySettings {
    url: Option<String>,
    token: Option<String>,
    function: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawPartnerSettings {
    api_url: Option<String>,
    timeout_seconds: Option<u64>,
    api_key: Option<String>,
    private_key: Option<String>,
}

impl RawPartnerSettings {
    fn apply_secrets(&mut self, secrets: RawPartnerSecrets) {
        if let Some(api_key) = secrets.api_key {
            self.api_key = Some(api_key);
        }
        if let Some(private_key) = secrets.private_key {
            self.private_key = Some(private_key);
        }
    }
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawPartnerSecrets {
    api_key: Option<String>,
    private_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawImageSettings {
    auto_generate: Option<bool>,
}

// Secrets must never reach logs through a derived Debug.
impl std::fmt::Debug for RawGatewaySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawGatewaySettings")
            .field("url", &self.url)
            .field("function", &self.function)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for RawPartnerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawPartnerSettings")
            .field("api_url", &self.api_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish_non_exhaustive()
    }
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid URL `{value}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "URL scheme must be http or https"));
    }
    Ok(url)
}

fn parse_optional_url(value: Option<String>, key: &'static str) -> Result<Option<Url>, LoadError> {
    non_blank(value)
        .map(|value| parse_url(&value, key))
        .transpose()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn positive_seconds(
    value: Option<u64>,
    default: u64,
    key: &'static str,
) -> Result<Duration, LoadError> {
    let seconds = value.unwrap_or(default);
    if seconds == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(seconds))
}
