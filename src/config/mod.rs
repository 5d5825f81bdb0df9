//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{
    ClientOverrides, CliArgs, Command, FeedArgs, FollowArgs, LikeArgs, LoggingOverrides,
    PostArgs, ProfileArgs, ScopeArg, ServeArgs,
};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
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
const LOCAL_CONFIG_BASENAME: &str = "murmur";
const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";
const DEFAULT_LISTEN_PORT: u16 = 3400;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_TWEET_LIMIT: usize = 1000;
const DEFAULT_PROFILE_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: BackendSettings,
    pub feed: FeedSettings,
    pub logging: LoggingSettings,
    pub dev_server: DevServerSettings,
    pub session: SessionSettings,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// `None` selects the in-process demo store.
    pub base_url: Option<Url>,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub page_size: NonZeroU32,
    pub tweet_limit: NonZeroUsize,
    pub profile_limit: NonZeroUsize,
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
pub struct DevServerSettings {
    pub listen_addr: SocketAddr,
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Absent means an unauthenticated session.
    pub viewer_id: Option<String>,
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

    builder = builder.add_source(Environment::with_prefix("MURMUR").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_logging_overrides(&cli.logging);
    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(args),
        Some(command) => {
            if let Some(overrides) = command.client_overrides() {
                raw.apply_client_overrides(overrides);
            }
        }
        None => raw.apply_serve_overrides(&ServeArgs::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    backend: RawBackendSettings,
    feed: RawFeedSettings,
    logging: RawLoggingSettings,
    dev_server: RawDevServerSettings,
    session: RawSessionSettings,
}

impl RawSettings {
    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeArgs) {
        if let Some(addr) = overrides.listen {
            self.dev_server.host = Some(addr.ip().to_string());
            self.dev_server.port = Some(addr.port());
        }
        if let Some(path) = overrides.seed_file.as_ref() {
            self.dev_server.seed_file = Some(path.clone());
        }
    }

    fn apply_client_overrides(&mut self, overrides: &ClientOverrides) {
        if let Some(url) = overrides.backend_url.as_ref() {
            self.backend.base_url = Some(url.clone());
        }
        if let Some(viewer) = overrides.viewer.as_ref() {
            self.session.viewer_id = Some(viewer.clone());
        }
        if let Some(page_size) = overrides.page_size {
            self.feed.page_size = Some(page_size);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            backend,
            feed,
            logging,
            dev_server,
            session,
        } = raw;

        Ok(Self {
            backend: build_backend_settings(backend)?,
            feed: build_feed_settings(feed)?,
            logging: build_logging_settings(logging)?,
            dev_server: build_dev_server_settings(dev_server)?,
            session: build_session_settings(session),
        })
    }
}

fn build_backend_settings(backend: RawBackendSettings) -> Result<BackendSettings, LoadError> {
    let base_url = match non_empty(backend.base_url) {
        Some(raw) => {
            let url = Url::parse(&raw)
                .map_err(|err| LoadError::invalid("backend.base_url", err.to_string()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(LoadError::invalid(
                    "backend.base_url",
                    format!("unsupported scheme `{}`", url.scheme()),
                ));
            }
            Some(url)
        }
        None => None,
    };

    let timeout_secs = backend
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "backend.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(BackendSettings {
        base_url,
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_feed_settings(feed: RawFeedSettings) -> Result<FeedSettings, LoadError> {
    let page_size = feed.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    let page_size = non_zero_u32(page_size.into(), "feed.page_size")?;
    if page_size.get() > 100 {
        return Err(LoadError::invalid("feed.page_size", "must be at most 100"));
    }

    let tweet_limit = NonZeroUsize::new(feed.tweet_limit.unwrap_or(DEFAULT_TWEET_LIMIT))
        .ok_or_else(|| LoadError::invalid("feed.tweet_limit", "must be greater than zero"))?;
    let profile_limit = NonZeroUsize::new(feed.profile_limit.unwrap_or(DEFAULT_PROFILE_LIMIT))
        .ok_or_else(|| LoadError::invalid("feed.profile_limit", "must be greater than zero"))?;

    Ok(FeedSettings {
        page_size,
        tweet_limit,
        profile_limit,
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

fn build_dev_server_settings(
    dev_server: RawDevServerSettings,
) -> Result<DevServerSettings, LoadError> {
    let host = dev_server
        .host
        .unwrap_or_else(|| DEFAULT_LISTEN_HOST.to_string());
    let port = dev_server.port.unwrap_or(DEFAULT_LISTEN_PORT);
    let listen_addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("dev_server.listen_addr", reason))?;

    let seed_file = dev_server
        .seed_file
        .filter(|path| !path.as_os_str().is_empty());

    Ok(DevServerSettings {
        listen_addr,
        seed_file,
    })
}

fn build_session_settings(session: RawSessionSettings) -> SessionSettings {
    SessionSettings {
        viewer_id: non_empty(session.viewer_id),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBackendSettings {
    base_url: Option<String>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFeedSettings {
    page_size: Option<u32>,
    tweet_limit: Option<usize>,
    profile_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDevServerSettings {
    host: Option<String>,
    port: Option<u16>,
    seed_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    viewer_id: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
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

#[cfg(test)]
mod tests;
