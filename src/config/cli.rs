use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the tweetreach binary.
#[derive(Debug, Parser)]
#[command(name = "tweetreach", version, about = "Retweet reach service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TWEETREACH_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Calculate the engagement of a single status URL and print it as JSON.
    #[command(name = "calculate")]
    Calculate(CalculateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ProviderOverrides {
    /// Override the provider API base URL.
    #[arg(long = "provider-base-url", value_name = "URL")]
    pub provider_base_url: Option<String>,

    /// Override the provider request timeout.
    #[arg(long = "provider-request-timeout-seconds", value_name = "SECONDS")]
    pub provider_request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(flatten)]
    pub provider: ProviderOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

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

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override how long a cached engagement stays fresh.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override how long a request waits on an in-flight aggregation.
    #[arg(long = "cache-wait-timeout-ms", value_name = "MS")]
    pub cache_wait_timeout_ms: Option<u64>,

    /// Override the in-memory store capacity used without a database.
    #[arg(long = "cache-memory-capacity", value_name = "COUNT")]
    pub cache_memory_capacity: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct CalculateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(flatten)]
    pub provider: ProviderOverrides,

    /// Status URL, e.g. https://x.com/user/status/12345.
    #[arg(value_name = "QUERY")]
    pub query: String,
}
