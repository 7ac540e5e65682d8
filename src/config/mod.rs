//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::*;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tweetreach";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_TTL_SECS: u64 = 900;
const DEFAULT_CACHE_WAIT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_CACHE_MEMORY_CAPACITY: usize = 10_000;
pub(crate) const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.twitter.com/1.1/";
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PROVIDER_PAGE_SIZE: u8 = 100;
const MAX_PROVIDER_PAGE_SIZE: u8 = 100;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub provider: ProviderSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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
pub struct DatabaseSettings {
    /// Without a URL, engagements are kept in a bounded in-memory store.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub wait_timeout: Duration,
    pub memory_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: Url,
    pub request_timeout: Duration,
    /// Retweets fetched per post. The provider serves a single page of at
    /// most 100 recent shares, so reach for more widely shared posts is a
    /// lower bound.
    pub page_size: u8,
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

    builder = builder.add_source(Environment::with_prefix("TWEETREACH").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Calculate(args)) => {
            raw.apply_database_override(&args.database);
            raw.apply_provider_overrides(&args.provider);
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

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    provider: RawProviderSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(wait) = overrides.cache_wait_timeout_ms {
            self.cache.wait_timeout_ms = Some(wait);
        }
        if let Some(capacity) = overrides.cache_memory_capacity {
            self.cache.memory_capacity = Some(capacity);
        }

        self.apply_database_override(&overrides.database);
        self.apply_provider_overrides(&overrides.provider);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }

    fn apply_provider_overrides(&mut self, overrides: &ProviderOverrides) {
        if let Some(url) = overrides.provider_base_url.as_ref() {
            self.provider.base_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.provider_request_timeout_seconds {
            self.provider.request_timeout_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            provider,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            provider: build_provider_settings(provider)?,
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

    Ok(ServerSettings { addr })
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

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_connections.into(), "database.max_connections")?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_seconds = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }

    let wait_timeout_ms = cache
        .wait_timeout_ms
        .unwrap_or(DEFAULT_CACHE_WAIT_TIMEOUT_MS);
    if wait_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "cache.wait_timeout_ms",
            "must be greater than zero",
        ));
    }

    let memory_capacity = cache
        .memory_capacity
        .unwrap_or(DEFAULT_CACHE_MEMORY_CAPACITY);

    Ok(CacheSettings {
        ttl: Duration::from_secs(ttl_seconds),
        wait_timeout: Duration::from_millis(wait_timeout_ms),
        memory_capacity: NonZeroUsize::new(memory_capacity).unwrap_or(NonZeroUsize::MIN),
    })
}

fn build_provider_settings(provider: RawProviderSettings) -> Result<ProviderSettings, LoadError> {
    let raw_url = provider
        .base_url
        .unwrap_or_else(|| DEFAULT_PROVIDER_BASE_URL.to_string());
    let mut base_url = Url::parse(raw_url.trim()).map_err(|err| {
        LoadError::invalid("provider.base_url", format!("invalid URL `{raw_url}`: {err}"))
    })?;
    // Relative joins drop the last path segment unless the base ends with a slash.
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }

    let timeout_seconds = provider
        .request_timeout_seconds
        .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "provider.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let page_size = provider.page_size.unwrap_or(DEFAULT_PROVIDER_PAGE_SIZE);
    if page_size == 0 || page_size > MAX_PROVIDER_PAGE_SIZE {
        return Err(LoadError::invalid(
            "provider.page_size",
            format!("must be between 1 and {MAX_PROVIDER_PAGE_SIZE}"),
        ));
    }

    Ok(ProviderSettings {
        base_url,
        request_timeout: Duration::from_secs(timeout_seconds),
        page_size,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    ttl_seconds: Option<u64>,
    wait_timeout_ms: Option<u64>,
    memory_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawProviderSettings {
    base_url: Option<String>,
    request_timeout_seconds: Option<u64>,
    page_size: Option<u8>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
