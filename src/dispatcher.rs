//! Single entry point for tool invocations from the MCP host and the harness.

use std::{sync::Arc, time::Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    booking_client::BookingBackend,
    catalog::Registry,
    domain::utils::redact_audit_value,
    errors::{ErrorKind, InvocationError},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InvocationResult {
    Success {
        payload: Value,
        elapsed_ms: u64,
    },
    Failure {
        kind: ErrorKind,
        message: String,
        elapsed_ms: u64,
    },
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn elapsed_ms(&self) -> u64 {
        match self {
            Self::Success { elapsed_ms, .. } | Self::Failure { elapsed_ms, .. } => *elapsed_ms,
        }
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    fn from_outcome(outcome: Result<Value, InvocationError>, elapsed_ms: u64) -> Self {
        match outcome {
            Ok(payload) => Self::Success {
                payload,
                elapsed_ms,
            },
            Err(error) => Self::Failure {
                kind: error.kind(),
                message: error.to_string(),
                elapsed_ms,
            },
        }
    }
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    backend: Arc<dyn BookingBackend>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, backend: Arc<dyn BookingBackend>) -> Self {
        Self { registry, backend }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn backend(&self) -> &Arc<dyn BookingBackend> {
        &self.backend
    }

    pub async fn dispatch(&self, request: InvocationRequest) -> InvocationResult {
        self.call(&request.tool_name, request.arguments).await
    }

    /// Resolves, validates and forwards one call. Never retries: callers own
    /// retry decisions, which matters for mutating tools.
    pub async fn call(&self, tool_name: &str, arguments: Value) -> InvocationResult {
        let started_at = Instant::now();
        let audit_arguments = redact_audit_value(&arguments);
        let outcome = self.try_call(tool_name, arguments).await;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;

        match &outcome {
            Ok(_) => info!(
                tool = %tool_name,
                arguments = %audit_arguments,
                elapsed_ms,
                outcome = "success",
                "tool invocation"
            ),
            Err(error) => warn!(
                tool = %tool_name,
                arguments = %audit_arguments,
                elapsed_ms,
                outcome = "failure",
                kind = %error.kind(),
                error = %error,
                "tool invocation"
            ),
        }

        InvocationResult::from_outcome(outcome, elapsed_ms)
    }

    async fn try_call(&self, tool_name: &str, arguments: Value) -> Result<Value, InvocationError> {
        let descriptor = self.registry.get(tool_name)?;
        let mut arguments = descriptor
            .input_schema
            .validate_arguments(arguments)
            .map_err(|violation| InvocationError::validation(violation.to_string()))?;
        descriptor
            .input_schema
            .apply_defaults(&mut arguments, descriptor.operation.language_param.as_deref());

        if descriptor.mutating {
            info!(tool = %descriptor.name, category = %descriptor.category, "dispatching mutating operation");
        }

        self.backend.invoke(&descriptor.operation, &arguments).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use serde_json::{json, Map};

    use super::*;
    use crate::{catalog::RemoteOperation, session::SessionInfo};

    /// Backend double that records every call it receives.
    #[derive(Default)]
    pub(crate) struct CountingBackend {
        pub(crate) calls: AtomicUsize,
        pub(crate) paths: Mutex<Vec<String>>,
        /// Paths that fail with a remote error.
        pub(crate) failing_paths: Vec<&'static str>,
        pub(crate) fail_authentication: bool,
        /// Every call fails as if the API host were down.
        pub(crate) unreachable: bool,
    }

    #[async_trait]
    impl BookingBackend for CountingBackend {
        async fn authenticate(&self, language: &str) -> Result<SessionInfo, InvocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(InvocationError::auth_unreachable(
                    "authentication failed: network error: connection refused",
                ));
            }
            if self.fail_authentication {
                return Err(InvocationError::auth("credentials rejected (401): Invalid credentials"));
            }
            let now = Utc::now();
            Ok(SessionInfo {
                authenticated: true,
                issued_at: now,
                expires_at: now + Duration::minutes(15),
                language: language.to_string(),
            })
        }

        async fn invoke(
            &self,
            operation: &RemoteOperation,
            arguments: &Map<String, Value>,
        ) -> Result<Value, InvocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.paths.lock().unwrap().push(operation.path.clone());

            if operation.kind == crate::catalog::OperationKind::Authenticate {
                let language = operation.language(arguments, "es").to_string();
                let info = self.authenticate(&language).await?;
                return Ok(serde_json::to_value(info).expect("session info"));
            }
            if self.unreachable {
                return Err(InvocationError::remote(None, "network error: connection refused"));
            }
            if self.failing_paths.contains(&operation.path.as_str()) {
                return Err(InvocationError::remote(Some(500), "remote error (500): boom"));
            }

            Ok(json!({"path": operation.path, "arguments": arguments}))
        }
    }

    pub(crate) fn dispatcher_with(backend: Arc<CountingBackend>) -> Dispatcher {
        let registry = Arc::new(Registry::builtin().expect("builtin catalog"));
        Dispatcher::new(registry, backend)
    }

    #[tokio::test]
    async fn successful_call_returns_payload_and_elapsed_time() {
        let backend = Arc::new(CountingBackend::default());
        let dispatcher = dispatcher_with(backend.clone());

        let result = dispatcher
            .call("hotel_search_rq", json!({"page": 1, "num_results": 5}))
            .await;

        match result {
            InvocationResult::Success { payload, .. } => {
                assert_eq!(payload["path"], "/HotelSearchRQ");
                assert_eq!(payload["arguments"]["num_results"], 5);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn schema_defaults_are_sent_for_absent_arguments() {
        let backend = Arc::new(CountingBackend::default());
        let dispatcher = dispatcher_with(backend);

        let result = dispatcher.call("hotel_search_rq", json!({})).await;

        match result {
            InvocationResult::Success { payload, .. } => {
                assert_eq!(payload["arguments"]["page"], 1);
                assert_eq!(payload["arguments"]["num_results"], 25);
                // The configured default language applies instead.
                assert!(payload["arguments"].get("language").is_none());
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_never_reaches_network() {
        let backend = Arc::new(CountingBackend::default());
        let dispatcher = dispatcher_with(backend.clone());

        let result = dispatcher.call("hotel_teleport_rq", json!({})).await;

        assert_eq!(result.failure_kind(), Some(ErrorKind::UnknownTool));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_required_field_never_reaches_network() {
        let backend = Arc::new(CountingBackend::default());
        let dispatcher = dispatcher_with(backend.clone());

        let result = dispatcher.call("basket_summary_rq", json!({})).await;

        match &result {
            InvocationResult::Failure { kind, message, .. } => {
                assert_eq!(*kind, ErrorKind::Validation);
                assert!(message.contains("basket_id"));
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn type_mismatch_and_unknown_fields_are_rejected_locally() {
        let backend = Arc::new(CountingBackend::default());
        let dispatcher = dispatcher_with(backend.clone());

        let mismatch = dispatcher
            .call("hotel_search_rq", json!({"page": "first"}))
            .await;
        let unknown = dispatcher
            .call("hotel_search_rq", json!({"hotel_name": "Sol"}))
            .await;
        let not_object = dispatcher.call("hotel_search_rq", json!("page=1")).await;

        for result in [mismatch, unknown, not_object] {
            assert_eq!(result.failure_kind(), Some(ErrorKind::Validation));
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn remote_failure_is_returned_without_retry() {
        let backend = Arc::new(CountingBackend {
            failing_paths: vec!["/OrderPutRQ"],
            ..Default::default()
        });
        let dispatcher = dispatcher_with(backend.clone());

        let result = dispatcher
            .call(
                "order_put_rq",
                json!({"order_id": "O1", "origin": "web", "provider": "p", "order_status": {"order_state": "confirm"}}),
            )
            .await;

        assert_eq!(result.failure_kind(), Some(ErrorKind::Remote));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispatch_accepts_invocation_request() {
        let backend = Arc::new(CountingBackend::default());
        let dispatcher = dispatcher_with(backend);
        let request: InvocationRequest =
            serde_json::from_value(json!({"tool_name": "zone_search_rq"})).expect("request");

        let result = dispatcher.dispatch(request).await;
        assert!(result.is_success());
    }

    #[test]
    fn result_serializes_with_outcome_tag() {
        let value = serde_json::to_value(InvocationResult::Failure {
            kind: ErrorKind::Timeout,
            message: "request timed out after 10 ms".to_string(),
            elapsed_ms: 10,
        })
        .expect("serialize");

        assert_eq!(value["outcome"], "failure");
        assert_eq!(value["kind"], "timeout");
        assert_eq!(value["elapsed_ms"], 10);
    }
}
