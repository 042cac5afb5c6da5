//! Outbound client for the Neobookings booking API.
//!
//! Owns the single remote session. A rejected session is replaced once and the
//! call retried once; every other failure is returned without retry.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, Method};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    catalog::{HttpMethod, OperationKind, RemoteOperation},
    config::{Config, Credentials, DEFAULT_SESSION_TTL_SECS},
    domain::utils::{snippet, SNIPPET_LIMIT},
    errors::InvocationError,
    session::{Clock, Session, SessionCell, SessionInfo, SystemClock},
};

pub const AUTHENTICATE_PATH: &str = "/AuthenticatorRQ";

#[async_trait]
pub trait BookingBackend: Send + Sync {
    /// Exchanges the configured credentials for a fresh session.
    async fn authenticate(&self, language: &str) -> Result<SessionInfo, InvocationError>;

    async fn invoke(
        &self,
        operation: &RemoteOperation,
        arguments: &Map<String, Value>,
    ) -> Result<Value, InvocationError>;
}

pub struct NeobookingsClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    timeout: Duration,
    session_ttl: chrono::Duration,
    default_language: String,
    session: SessionCell,
    clock: Arc<dyn Clock>,
}

#[derive(Debug)]
enum CallFailure {
    Rejected { status: u16, message: String },
    Failed(InvocationError),
}

impl NeobookingsClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let session_ttl = chrono::Duration::from_std(config.session_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_SESSION_TTL_SECS as i64));

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            credentials: config.credentials.clone(),
            timeout: config.timeout,
            session_ttl,
            default_language: config.default_language.clone(),
            session: SessionCell::new(),
            clock,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn login(&self, path: &str, language: &str) -> Result<Session, InvocationError> {
        let body = json!({
            "Request": request_envelope(language),
            "Credentials": {
                "ClientCode": self.credentials.client_code,
                "SystemCode": self.credentials.system_code,
                "Username": self.credentials.username,
                "Password": self.credentials.password,
            }
        });

        let response = match self.send(HttpMethod::Post, path, &body, None).await {
            Ok(value) => value,
            Err(CallFailure::Rejected { status, message }) => {
                return Err(InvocationError::auth(format!(
                    "credentials rejected ({status}): {message}"
                )))
            }
            Err(CallFailure::Failed(error)) if !error.api_reached() => {
                return Err(InvocationError::auth_unreachable(format!(
                    "authentication failed: {error}"
                )))
            }
            Err(CallFailure::Failed(error)) => {
                return Err(InvocationError::auth(format!(
                    "authentication failed: {error}"
                )))
            }
        };

        let token = response
            .get("Token")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| InvocationError::auth("authentication response did not include a token"))?;

        let session = Session::new(token, self.clock.now(), self.session_ttl);
        info!(expires_at = %session.expires_at, "remote session established");
        Ok(session)
    }

    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: &Value,
        token: Option<&str>,
    ) -> Result<Value, CallFailure> {
        let url = format!("{}{}", self.base_url, path);
        let started_at = Instant::now();

        let mut request = self.http.request(to_method(method), &url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|error| CallFailure::Failed(self.transport_error(&error, started_at)))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|error| CallFailure::Failed(self.transport_error(&error, started_at)))?;

        debug!(
            path = %path,
            status,
            duration_ms = started_at.elapsed().as_millis(),
            "remote call completed"
        );

        classify_response(status, &text)
    }

    fn transport_error(&self, error: &reqwest::Error, started_at: Instant) -> InvocationError {
        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        if error.is_timeout() {
            warn!(elapsed_ms, timeout_secs = self.timeout.as_secs_f64(), "remote call timed out");
            return InvocationError::Timeout { elapsed_ms };
        }

        InvocationError::remote(
            error.status().map(|status| status.as_u16()),
            format!("network error: {error}"),
        )
    }
}

#[async_trait]
impl BookingBackend for NeobookingsClient {
    async fn authenticate(&self, language: &str) -> Result<SessionInfo, InvocationError> {
        let session = self
            .session
            .renew(|| self.login(AUTHENTICATE_PATH, language))
            .await?;
        Ok(session.info(language))
    }

    async fn invoke(
        &self,
        operation: &RemoteOperation,
        arguments: &Map<String, Value>,
    ) -> Result<Value, InvocationError> {
        let language = operation
            .language(arguments, &self.default_language)
            .to_string();

        if operation.kind == OperationKind::Authenticate {
            let session = self
                .session
                .renew(|| self.login(&operation.path, &language))
                .await?;
            return serde_json::to_value(session.info(&language)).map_err(|error| {
                InvocationError::remote(None, format!("failed to encode session info: {error}"))
            });
        }

        let body = operation.wire_body(arguments, request_envelope(&language));
        let session = self
            .session
            .get_or_refresh(self.clock.now(), || {
                self.login(AUTHENTICATE_PATH, &language)
            })
            .await?;

        let status = match self
            .send(operation.method, &operation.path, &body, Some(&session.token))
            .await
        {
            Ok(value) => return Ok(value),
            Err(CallFailure::Failed(error)) => return Err(error),
            Err(CallFailure::Rejected { status, .. }) => status,
        };

        warn!(path = %operation.path, status, "remote rejected session, re-authenticating");
        let fresh = self
            .session
            .refresh_rejected(&session.token, self.clock.now(), || {
                self.login(AUTHENTICATE_PATH, &language)
            })
            .await?;

        match self
            .send(operation.method, &operation.path, &body, Some(&fresh.token))
            .await
        {
            Ok(value) => Ok(value),
            Err(CallFailure::Failed(error)) => Err(error),
            Err(CallFailure::Rejected { status, message }) => Err(InvocationError::auth(format!(
                "remote rejected the request after re-authentication ({status}): {message}"
            ))),
        }
    }
}

pub fn request_envelope(language: &str) -> Value {
    json!({
        "RequestId": Uuid::new_v4().to_string(),
        "Timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "Language": language,
    })
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn classify_response(status: u16, text: &str) -> Result<Value, CallFailure> {
    match status {
        200..=299 => {
            let value: Value = serde_json::from_str(text).map_err(|_| {
                CallFailure::Failed(InvocationError::remote(
                    Some(status),
                    format!(
                        "response was not valid JSON: {}",
                        snippet(text, SNIPPET_LIMIT)
                    ),
                ))
            })?;
            check_api_status(value)
        }
        _ => Err(failure_for_status(status, remote_message(text))),
    }
}

/// The remote API reports business errors with HTTP 200 and a `Response.StatusCode`.
fn check_api_status(value: Value) -> Result<Value, CallFailure> {
    let code = value
        .get("Response")
        .and_then(|response| response.get("StatusCode"))
        .and_then(|code| {
            code.as_u64()
                .or_else(|| code.as_str().and_then(|text| text.trim().parse().ok()))
        });

    match code {
        Some(code) if !(200..300).contains(&code) => {
            let message = api_error_message(&value).unwrap_or_else(|| format!("status {code}"));
            Err(failure_for_status(
                u16::try_from(code).unwrap_or(u16::MAX),
                message,
            ))
        }
        _ => Ok(value),
    }
}

fn failure_for_status(status: u16, message: String) -> CallFailure {
    match status {
        401 | 403 => CallFailure::Rejected { status, message },
        400..=499 => CallFailure::Failed(InvocationError::validation(format!(
            "remote rejected the request ({status}): {message}"
        ))),
        _ => CallFailure::Failed(InvocationError::remote(
            Some(status),
            format!("remote error ({status}): {message}"),
        )),
    }
}

fn remote_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|value| api_error_message(&value))
        .unwrap_or_else(|| snippet(text, SNIPPET_LIMIT))
}

fn api_error_message(value: &Value) -> Option<String> {
    let errors = value.get("Response")?.get("Error")?;
    let entries = match errors {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        Value::Object(_) => vec![errors],
        _ => return None,
    };

    let messages = entries
        .into_iter()
        .filter_map(|entry| {
            let code = entry.get("Code").map(|code| match code {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            });
            let description = entry.get("Description").and_then(Value::as_str);
            match (code, description) {
                (Some(code), Some(description)) => Some(format!("{code}: {description}")),
                (None, Some(description)) => Some(description.to_string()),
                (Some(code), None) => Some(code),
                (None, None) => None,
            }
        })
        .collect::<Vec<_>>();

    if messages.is_empty() {
        None
    } else {
        Some(snippet(&messages.join("; "), SNIPPET_LIMIT))
    }
}
