//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "wavecache";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8404;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_COMPUTE_TIMEOUT_SECS: u64 = 180;
const DEFAULT_PRECOMPUTE_QUOTA: u32 = 10;
const DEFAULT_PRECOMPUTE_SCAN_INTERVAL_SECS: u64 = 5;
const DEFAULT_PRECOMPUTE_BATCH: u32 = 32;
const DEFAULT_PRECOMPUTE_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_PRECOMPUTE_RECLAIM_AFTER_SECS: u64 = 900;
const DEFAULT_INVALIDATION_RADIUS_KM: f64 =
    crate::application::invalidation::DEFAULT_SPATIAL_RADIUS_KM;
const DEFAULT_BROKER_CHANNEL_PREFIX: &str = "wavecache_rsp";

/// Command-line arguments for the wavecache binary.
#[derive(Debug, Parser)]
#[command(name = "wavecache", version, about = "wavecache response-cache server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "WAVECACHE_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the cache service.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
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

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the compute engine endpoint.
    #[arg(long = "compute-url", value_name = "URL")]
    pub compute_url: Option<String>,

    /// Override the compute call timeout.
    #[arg(long = "compute-timeout-seconds", value_name = "SECONDS")]
    pub compute_timeout_seconds: Option<u64>,

    /// Override the initial precompute concurrency quota.
    #[arg(long = "precompute-quota", value_name = "COUNT")]
    pub precompute_quota: Option<u32>,

    /// Override the scheduler scan cadence.
    #[arg(long = "precompute-scan-interval-seconds", value_name = "SECONDS")]
    pub precompute_scan_interval_seconds: Option<u64>,

    /// Override the per-pass claim ceiling.
    #[arg(long = "precompute-batch", value_name = "COUNT")]
    pub precompute_batch: Option<u32>,

    /// Override the consecutive-failure ceiling before a row stops retrying.
    #[arg(long = "precompute-max-attempts", value_name = "COUNT")]
    pub precompute_max_attempts: Option<u32>,

    /// Override the stuck-row reclaim timeout.
    #[arg(long = "precompute-reclaim-after-seconds", value_name = "SECONDS")]
    pub precompute_reclaim_after_seconds: Option<u64>,

    /// Override the default spatial invalidation radius.
    #[arg(long = "invalidation-default-radius-km", value_name = "KM")]
    pub invalidation_default_radius_km: Option<f64>,

    /// Override the optional ruleset directory endpoint.
    #[arg(long = "invalidation-ruleset-directory-url", value_name = "URL")]
    pub invalidation_ruleset_directory_url: Option<String>,

    /// Override the broker notification channel prefix.
    #[arg(long = "broker-channel-prefix", value_name = "PREFIX")]
    pub broker_channel_prefix: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub compute: ComputeSettings,
    pub precompute: PrecomputeConfig,
    pub invalidation: InvalidationSettings,
    pub broker: BrokerSettings,
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
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct ComputeSettings {
    pub url: Option<Url>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PrecomputeConfig {
    pub quota: NonZeroU32,
    pub scan_interval: Duration,
    pub batch: NonZeroU32,
    pub max_attempts: u32,
    pub reclaim_after: Duration,
}

#[derive(Debug, Clone)]
pub struct InvalidationSettings {
    pub default_radius_km: f64,
    pub ruleset_directory_url: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub channel_prefix: String,
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

/// Parse CLI arguments and load settings in one step.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("WAVECACHE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    compute: RawComputeSettings,
    precompute: RawPrecomputeSettings,
    invalidation: RawInvalidationSettings,
    broker: RawBrokerSettings,
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
struct RawComputeSettings {
    url: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPrecomputeSettings {
    quota: Option<u32>,
    scan_interval_seconds: Option<u64>,
    batch: Option<u32>,
    max_attempts: Option<u32>,
    reclaim_after_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawInvalidationSettings {
    default_radius_km: Option<f64>,
    ruleset_directory_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBrokerSettings {
    channel_prefix: Option<String>,
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
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(url) = overrides.compute_url.as_ref() {
            self.compute.url = Some(url.clone());
        }
        if let Some(timeout) = overrides.compute_timeout_seconds {
            self.compute.timeout_seconds = Some(timeout);
        }
        if let Some(quota) = overrides.precompute_quota {
            self.precompute.quota = Some(quota);
        }
        if let Some(interval) = overrides.precompute_scan_interval_seconds {
            self.precompute.scan_interval_seconds = Some(interval);
        }
        if let Some(batch) = overrides.precompute_batch {
            self.precompute.batch = Some(batch);
        }
        if let Some(attempts) = overrides.precompute_max_attempts {
            self.precompute.max_attempts = Some(attempts);
        }
        if let Some(reclaim) = overrides.precompute_reclaim_after_seconds {
            self.precompute.reclaim_after_seconds = Some(reclaim);
        }
        if let Some(radius) = overrides.invalidation_default_radius_km {
            self.invalidation.default_radius_km = Some(radius);
        }
        if let Some(url) = overrides.invalidation_ruleset_directory_url.as_ref() {
            self.invalidation.ruleset_directory_url = Some(url.clone());
        }
        if let Some(prefix) = overrides.broker_channel_prefix.as_ref() {
            self.broker.channel_prefix = Some(prefix.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            compute,
            precompute,
            invalidation,
            broker,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            compute: build_compute_settings(compute)?,
            precompute: build_precompute_settings(precompute)?,
            invalidation: build_invalidation_settings(invalidation)?,
            broker: build_broker_settings(broker)?,
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

    let addr = parse_socket_addr(&host, port).map_err(|reason| {
        LoadError::invalid("server.addr", reason)
    })?;

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

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_value, "database.max_connections")?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_compute_settings(compute: RawComputeSettings) -> Result<ComputeSettings, LoadError> {
    let url = match compute.url {
        Some(value) if !value.trim().is_empty() => Some(
            Url::parse(value.trim())
                .map_err(|err| LoadError::invalid("compute.url", err.to_string()))?,
        ),
        _ => None,
    };

    let timeout_secs = compute
        .timeout_seconds
        .unwrap_or(DEFAULT_COMPUTE_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "compute.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ComputeSettings {
        url,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_precompute_settings(
    precompute: RawPrecomputeSettings,
) -> Result<PrecomputeConfig, LoadError> {
    let quota = non_zero_u32(
        precompute.quota.unwrap_or(DEFAULT_PRECOMPUTE_QUOTA),
        "precompute.quota",
    )?;
    let batch = non_zero_u32(
        precompute.batch.unwrap_or(DEFAULT_PRECOMPUTE_BATCH),
        "precompute.batch",
    )?;

    let scan_secs = precompute
        .scan_interval_seconds
        .unwrap_or(DEFAULT_PRECOMPUTE_SCAN_INTERVAL_SECS);
    if scan_secs == 0 {
        return Err(LoadError::invalid(
            "precompute.scan_interval_seconds",
            "must be greater than zero",
        ));
    }

    let max_attempts = precompute
        .max_attempts
        .unwrap_or(DEFAULT_PRECOMPUTE_MAX_ATTEMPTS);
    if max_attempts == 0 {
        return Err(LoadError::invalid(
            "precompute.max_attempts",
            "must be greater than zero",
        ));
    }

    let reclaim_secs = precompute
        .reclaim_after_seconds
        .unwrap_or(DEFAULT_PRECOMPUTE_RECLAIM_AFTER_SECS);
    if reclaim_secs == 0 {
        return Err(LoadError::invalid(
            "precompute.reclaim_after_seconds",
            "must be greater than zero",
        ));
    }

    Ok(PrecomputeConfig {
        quota,
        scan_interval: Duration::from_secs(scan_secs),
        batch,
        max_attempts,
        reclaim_after: Duration::from_secs(reclaim_secs),
    })
}

fn build_invalidation_settings(
    invalidation: RawInvalidationSettings,
) -> Result<InvalidationSettings, LoadError> {
    let default_radius_km = invalidation
        .default_radius_km
        .unwrap_or(DEFAULT_INVALIDATION_RADIUS_KM);
    if !default_radius_km.is_finite() || default_radius_km <= 0.0 {
        return Err(LoadError::invalid(
            "invalidation.default_radius_km",
            "must be a positive number",
        ));
    }

    let ruleset_directory_url = match invalidation.ruleset_directory_url {
        Some(value) if !value.trim().is_empty() => Some(Url::parse(value.trim()).map_err(
            |err| LoadError::invalid("invalidation.ruleset_directory_url", err.to_string()),
        )?),
        _ => None,
    };

    Ok(InvalidationSettings {
        default_radius_km,
        ruleset_directory_url,
    })
}

fn build_broker_settings(broker: RawBrokerSettings) -> Result<BrokerSettings, LoadError> {
    let channel_prefix = broker
        .channel_prefix
        .unwrap_or_else(|| DEFAULT_BROKER_CHANNEL_PREFIX.to_string());

    let valid = !channel_prefix.is_empty()
        && channel_prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && channel_prefix
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    if !valid {
        return Err(LoadError::invalid(
            "broker.channel_prefix",
            "must match [a-z_][a-z0-9_]*",
        ));
    }

    Ok(BrokerSettings { channel_prefix })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    format!("{host}:{port}")
        .parse::<SocketAddr>()
        .map_err(|err| format!("failed to parse `{host}:{port}`: {err}"))
}

fn non_zero_u32(value: u32, key: &'static str) -> Result<NonZeroU32, LoadError> {
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests;
