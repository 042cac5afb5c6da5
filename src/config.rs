use std::{env, fmt, net::SocketAddr, path::PathBuf, time::Duration};

use serde_json::{json, Value};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://ws-test.neobookings.com/api/v2";
pub const DEFAULT_SYSTEM_CODE: &str = "XML";
pub const DEFAULT_LANGUAGE: &str = "es";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 900;

#[derive(Clone)]
pub struct Credentials {
    pub client_code: String,
    pub system_code: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_code", &self.client_code)
            .field("system_code", &self.system_code)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub credentials: Credentials,
    pub timeout: Duration,
    pub session_ttl: Duration,
    pub default_language: String,
    pub catalog_path: Option<PathBuf>,
    pub api_token: Option<String>,
    pub bind_addr: String,
    /// Raw `BIND_PORT`; parsed by `bind_socket` only when serving over HTTP.
    pub bind_port: String,
    /// Variables that were not set and fell back to a built-in default.
    pub defaulted: Vec<&'static str>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required and must not be empty")]
    Missing(&'static str),
    #[error("{0} must be a positive number of seconds")]
    InvalidSeconds(&'static str),
    #[error("NEO_API_BASE_URL must be an http(s) URL")]
    InvalidBaseUrl,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("invalid bind address or port")]
    InvalidSocket,
    #[error("MCP_API_TOKEN is required when serving over HTTP")]
    MissingApiToken,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut defaulted = Vec::new();

        let base_url = match read("NEO_API_BASE_URL") {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                defaulted.push("NEO_API_BASE_URL");
                DEFAULT_BASE_URL.to_string()
            }
        };
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(ConfigError::InvalidBaseUrl);
        }

        let client_code = read("NEO_CLIENT_CODE").ok_or(ConfigError::Missing("NEO_CLIENT_CODE"))?;
        let username = read("NEO_USERNAME").ok_or(ConfigError::Missing("NEO_USERNAME"))?;
        let password = read("NEO_PASSWORD").ok_or(ConfigError::Missing("NEO_PASSWORD"))?;
        let system_code = read("NEO_SYSTEM_CODE").unwrap_or_else(|| {
            defaulted.push("NEO_SYSTEM_CODE");
            DEFAULT_SYSTEM_CODE.to_string()
        });

        let timeout = parse_seconds(
            read("NEO_API_TIMEOUT"),
            "NEO_API_TIMEOUT",
            DEFAULT_TIMEOUT_SECS,
            &mut defaulted,
        )?;
        let session_ttl = parse_seconds(
            read("NEO_SESSION_TTL"),
            "NEO_SESSION_TTL",
            DEFAULT_SESSION_TTL_SECS,
            &mut defaulted,
        )?;

        let default_language = read("NEO_DEFAULT_LANGUAGE")
            .map(|value| value.to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let bind_addr = read("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());
        let bind_port = read("BIND_PORT").unwrap_or_else(|| "8080".to_string());

        let config = Self {
            base_url,
            credentials: Credentials {
                client_code,
                system_code,
                username,
                password,
            },
            timeout,
            session_ttl,
            default_language,
            catalog_path: read("NEO_CATALOG_PATH").map(PathBuf::from),
            api_token: read("MCP_API_TOKEN"),
            bind_addr,
            bind_port,
            defaulted,
        };

        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        let port = self
            .bind_port
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        format!("{}:{}", self.bind_addr, port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }

    pub fn require_api_token(&self) -> Result<&str, ConfigError> {
        self.api_token
            .as_deref()
            .ok_or(ConfigError::MissingApiToken)
    }

    /// Configuration view that is safe to log or write into reports.
    pub fn summary(&self) -> Value {
        json!({
            "base_url": self.base_url,
            "client_code": self.credentials.client_code,
            "system_code": self.credentials.system_code,
            "username": self.credentials.username,
            "password": "[REDACTED]",
            "timeout_secs": self.timeout.as_secs(),
            "session_ttl_secs": self.session_ttl.as_secs(),
            "default_language": self.default_language,
            "catalog_path": self.catalog_path.as_ref().map(|path| path.display().to_string()),
            "http_token_configured": self.api_token.is_some(),
        })
    }
}

fn parse_seconds(
    value: Option<String>,
    key: &'static str,
    default: u64,
    defaulted: &mut Vec<&'static str>,
) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        defaulted.push(key);
        return Ok(Duration::from_secs(default));
    };

    let seconds = value
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidSeconds(key))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ConfigError::InvalidSeconds(key));
    }

    Ok(Duration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const CREDENTIALS: [(&str, &str); 3] = [
        ("NEO_CLIENT_CODE", "client"),
        ("NEO_USERNAME", "user"),
        ("NEO_PASSWORD", "pass"),
    ];

    #[test]
    fn parse_defaults() {
        let config = Config::from_lookup(lookup(&CREDENTIALS)).expect("config should parse");

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.credentials.system_code, "XML");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.session_ttl, Duration::from_secs(900));
        assert_eq!(config.default_language, "es");
        assert_eq!(config.bind_socket().expect("socket").port(), 8080);
        assert!(config.api_token.is_none());
        assert!(config.defaulted.contains(&"NEO_API_BASE_URL"));
        assert!(config.defaulted.contains(&"NEO_API_TIMEOUT"));
    }

    #[test]
    fn missing_password_fails() {
        let err = Config::from_lookup(lookup(&[
            ("NEO_CLIENT_CODE", "client"),
            ("NEO_USERNAME", "user"),
            ("NEO_PASSWORD", "   "),
        ]))
        .expect_err("expected missing password");

        assert!(matches!(err, ConfigError::Missing("NEO_PASSWORD")));
    }

    #[test]
    fn rejects_non_positive_timeout() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("NEO_API_TIMEOUT", "0"));

        let err = Config::from_lookup(lookup(&pairs)).expect_err("expected invalid timeout");
        assert!(matches!(err, ConfigError::InvalidSeconds("NEO_API_TIMEOUT")));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("NEO_API_BASE_URL", "ftp://example.com"));

        let err = Config::from_lookup(lookup(&pairs)).expect_err("expected invalid url");
        assert!(matches!(err, ConfigError::InvalidBaseUrl));
    }

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("NEO_API_BASE_URL", "http://127.0.0.1:9000/api/v2/"));

        let config = Config::from_lookup(lookup(&pairs)).expect("config should parse");
        assert_eq!(config.base_url, "http://127.0.0.1:9000/api/v2");
        assert!(!config.defaulted.contains(&"NEO_API_BASE_URL"));
    }

    #[test]
    fn summary_redacts_password() {
        let config = Config::from_lookup(lookup(&CREDENTIALS)).expect("config should parse");
        let summary = config.summary();

        assert_eq!(summary["password"], "[REDACTED]");
        assert!(!summary.to_string().contains("pass\""));
        assert!(!format!("{:?}", config.credentials).contains("\"pass\""));
    }

    #[test]
    fn http_mode_requires_api_token() {
        let config = Config::from_lookup(lookup(&CREDENTIALS)).expect("config should parse");
        assert!(matches!(
            config.require_api_token(),
            Err(ConfigError::MissingApiToken)
        ));
    }

    #[test]
    fn bad_bind_settings_only_fail_when_binding() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("BIND_PORT", "http"));
        pairs.push(("BIND_ADDR", "not an address"));

        let config = Config::from_lookup(lookup(&pairs)).expect("stdio config still parses");
        assert!(matches!(config.bind_socket(), Err(ConfigError::InvalidPort)));

        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("BIND_ADDR", "not an address"));
        let config = Config::from_lookup(lookup(&pairs)).expect("config");
        assert!(matches!(config.bind_socket(), Err(ConfigError::InvalidSocket)));
    }
}
