use std::net::SocketAddr;
use std::time::Duration as StdDuration;

use axum::http::HeaderValue;
use secrecy::SecretString;
use tracing::warn;
use url::Url;

use super::error::InfraError;
use crate::use_cases::auth::MagicLinkSettings;

const DEFAULT_PORT: &str = "6174";
const DEFAULT_MAGIC_LINK_BASE_URL: &str = "http://localhost:3000/auth/verify";
const DEFAULT_MAGIC_LINK_TTL_MINUTES: i64 = 15;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeEnv {
    Dev,
    Production,
}

impl RuntimeEnv {
    /// Only the exact value "dev" enables development behavior.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("dev") => RuntimeEnv::Dev,
            _ => RuntimeEnv::Production,
        }
    }
}

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Unset means the service runs without a store and auth routes answer 503.
    pub database_url: Option<SecretString>,
    pub database_max_connections: u32,
    pub env: RuntimeEnv,
    pub magic_link_base_url: Url,
    pub magic_link_ttl: chrono::Duration,
    pub cors_origin: HeaderValue,
    pub request_timeout: StdDuration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, InfraError> {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let port = get("PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());
        let bind_addr: SocketAddr = format!("0.0.0.0:{}", port.trim())
            .parse()
            .map_err(|_| InfraError::ConfigInvalid {
                var: "PORT",
                reason: "must be a TCP port number",
            })?;

        let database_url = get("DATABASE_URL").map(SecretString::from);

        let env = RuntimeEnv::from_raw(get("ENV").as_deref());

        let magic_link_base_url = match get("MAGIC_LINK_BASE_URL") {
            Some(raw) => Url::parse(raw.trim()).map_err(|_| InfraError::ConfigInvalid {
                var: "MAGIC_LINK_BASE_URL",
                reason: "must be an absolute URL",
            })?,
            None => Url::parse(DEFAULT_MAGIC_LINK_BASE_URL).map_err(|_| {
                InfraError::ConfigInvalid {
                    var: "MAGIC_LINK_BASE_URL",
                    reason: "default is not a valid URL",
                }
            })?,
        };

        let magic_link_ttl = magic_link_ttl(get("MAGIC_LINK_TTL_MINUTES"));

        let cors_origin: HeaderValue = get("CORS_ORIGIN")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string())
            .parse()
            .map_err(|_| InfraError::ConfigInvalid {
                var: "CORS_ORIGIN",
                reason: "must be a valid header value",
            })?;

        let request_timeout_secs = positive_or_default(
            "REQUEST_TIMEOUT_SECS",
            get("REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        );

        let database_max_connections = positive_or_default(
            "DATABASE_MAX_CONNECTIONS",
            get("DATABASE_MAX_CONNECTIONS"),
            DEFAULT_DATABASE_MAX_CONNECTIONS,
        );

        Ok(Self {
            bind_addr,
            database_url,
            database_max_connections,
            env,
            magic_link_base_url,
            magic_link_ttl,
            cors_origin,
            request_timeout: StdDuration::from_secs(request_timeout_secs),
        })
    }

    pub fn magic_link_settings(&self) -> MagicLinkSettings {
        MagicLinkSettings {
            ttl: self.magic_link_ttl,
            base_url: self.magic_link_base_url.clone(),
            expose_dev_link: self.env == RuntimeEnv::Dev,
            request_timeout: self.request_timeout,
        }
    }
}

/// Minutes must also fit a `chrono::Duration`.
fn magic_link_ttl(raw: Option<String>) -> chrono::Duration {
    let fallback = chrono::Duration::minutes(DEFAULT_MAGIC_LINK_TTL_MINUTES);
    let minutes = positive_or_default(
        "MAGIC_LINK_TTL_MINUTES",
        raw,
        DEFAULT_MAGIC_LINK_TTL_MINUTES,
    );
    chrono::Duration::try_minutes(minutes).unwrap_or_else(|| {
        warn!(
            var = "MAGIC_LINK_TTL_MINUTES",
            value = minutes,
            fallback = DEFAULT_MAGIC_LINK_TTL_MINUTES,
            "ignoring invalid setting"
        );
        fallback
    })
}

/// Parses a positive integer, falling back to `default` on anything else.
fn positive_or_default<T>(var: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!(var, value = %raw, fallback = %default, "ignoring invalid setting");
            default
        }
    }
}
