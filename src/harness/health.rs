//! Categorized health checks.
//!
//! A run walks `Idle -> Configuring -> Running(category)* -> Aggregating -> Done`.
//! Failed checks in a critical category escalate the overall status to
//! `CRITICAL_FAILURES`; failed advisory checks degrade it to `PARTIAL_SUCCESS`.
//! Warnings never change the overall status.

use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::catalog::{Category, EXPECTED_TOOL_COUNT};
use crate::config::{Config, DEFAULT_LANGUAGE};
use crate::dispatcher::{Dispatcher, InvocationResult};
use crate::domain::utils::{sample_arguments, snippet, SNIPPET_LIMIT};
use crate::errors::ErrorKind;
use crate::harness::{
    benchmark::{hotel_search_arguments, run_concurrent},
    grade::{grade_latency, grade_outcome, Grade},
    HarnessError, EXIT_CRITICAL, EXIT_OK, EXIT_PARTIAL,
};

const SLOW_CHECK_MS: u64 = 5000;
const HEALTH_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCategory {
    Configuration,
    Connectivity,
    Authentication,
    ToolsRegistry,
    BasicEndpoints,
    AdvancedEndpoints,
    Performance,
    ErrorHandling,
}

impl HealthCategory {
    pub const ALL: [HealthCategory; 8] = [
        HealthCategory::Configuration,
        HealthCategory::Connectivity,
        HealthCategory::Authentication,
        HealthCategory::ToolsRegistry,
        HealthCategory::BasicEndpoints,
        HealthCategory::AdvancedEndpoints,
        HealthCategory::Performance,
        HealthCategory::ErrorHandling,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Connectivity => "connectivity",
            Self::Authentication => "authentication",
            Self::ToolsRegistry => "tools_registry",
            Self::BasicEndpoints => "basic_endpoints",
            Self::AdvancedEndpoints => "advanced_endpoints",
            Self::Performance => "performance",
            Self::ErrorHandling => "error_handling",
        }
    }

    pub fn is_critical(self) -> bool {
        matches!(
            self,
            Self::Configuration
                | Self::Connectivity
                | Self::Authentication
                | Self::ToolsRegistry
                | Self::BasicEndpoints
        )
    }

    pub fn checks(self) -> &'static [Check] {
        match self {
            Self::Configuration => &[Check::ConfigValidation, Check::EnvironmentCheck],
            Self::Connectivity => &[Check::ApiConnectivity],
            Self::Authentication => &[Check::AuthTest, Check::TokenValidation],
            Self::ToolsRegistry => &[
                Check::ToolsLoaded,
                Check::CategoryCounts,
                Check::SchemaValidation,
            ],
            Self::BasicEndpoints => &[Check::HotelSearch, Check::ZoneSearch, Check::BudgetSearch],
            Self::AdvancedEndpoints => &[
                Check::PackageDetails,
                Check::OrderSearch,
                Check::GenericProductDetails,
            ],
            Self::Performance => &[Check::ResponseTimes, Check::ConcurrentRequests],
            Self::ErrorHandling => &[Check::InvalidRequests, Check::UnknownTool],
        }
    }
}

impl fmt::Display for HealthCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthCategory {
    type Err = HarnessError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| HarnessError::UnknownCategory(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    ConfigValidation,
    EnvironmentCheck,
    ApiConnectivity,
    AuthTest,
    TokenValidation,
    ToolsLoaded,
    CategoryCounts,
    SchemaValidation,
    HotelSearch,
    ZoneSearch,
    BudgetSearch,
    PackageDetails,
    OrderSearch,
    GenericProductDetails,
    ResponseTimes,
    ConcurrentRequests,
    InvalidRequests,
    UnknownTool,
}

impl Check {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigValidation => "config_validation",
            Self::EnvironmentCheck => "environment_check",
            Self::ApiConnectivity => "api_connectivity",
            Self::AuthTest => "auth_test",
            Self::TokenValidation => "token_validation",
            Self::ToolsLoaded => "tools_loaded",
            Self::CategoryCounts => "category_counts",
            Self::SchemaValidation => "schema_validation",
            Self::HotelSearch => "hotel_search",
            Self::ZoneSearch => "zone_search",
            Self::BudgetSearch => "budget_search",
            Self::PackageDetails => "package_details",
            Self::OrderSearch => "order_search",
            Self::GenericProductDetails => "generic_product_details",
            Self::ResponseTimes => "response_times",
            Self::ConcurrentRequests => "concurrent_requests",
            Self::InvalidRequests => "invalid_requests",
            Self::UnknownTool => "unknown_tool",
        }
    }

    /// Checks that exercise the remote API and therefore get a latency grade.
    fn is_timed(self) -> bool {
        !matches!(
            self,
            Self::ConfigValidation
                | Self::EnvironmentCheck
                | Self::ToolsLoaded
                | Self::CategoryCounts
                | Self::SchemaValidation
                | Self::UnknownTool
        )
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warn,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: Check,
    pub category: HealthCategory,
    pub status: CheckStatus,
    pub critical: bool,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CheckResult {
    pub fn failed(&self) -> bool {
        self.status == CheckStatus::Fail
    }

    fn label(&self) -> String {
        format!("{}.{}: {}", self.category, self.name, self.detail)
    }
}

struct Outcome {
    status: CheckStatus,
    detail: String,
    data: Option<Value>,
}

impl Outcome {
    fn pass(detail: impl Into<String>) -> Self {
        Self::new(CheckStatus::Pass, detail)
    }

    fn fail(detail: impl Into<String>) -> Self {
        Self::new(CheckStatus::Fail, detail)
    }

    fn warn(detail: impl Into<String>) -> Self {
        Self::new(CheckStatus::Warn, detail)
    }

    fn new(status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            data: None,
        }
    }

    fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    AllTestsPassed,
    PartialSuccess,
    CriticalFailures,
}

impl OverallStatus {
    pub fn from_results(results: &[CheckResult]) -> Self {
        if results.iter().any(|result| result.critical && result.failed()) {
            Self::CriticalFailures
        } else if results.iter().any(CheckResult::failed) {
            Self::PartialSuccess
        } else {
            Self::AllTestsPassed
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Self::AllTestsPassed => EXIT_OK,
            Self::PartialSuccess => EXIT_PARTIAL,
            Self::CriticalFailures => EXIT_CRITICAL,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllTestsPassed => "ALL_TESTS_PASSED",
            Self::PartialSuccess => "PARTIAL_SUCCESS",
            Self::CriticalFailures => "CRITICAL_FAILURES",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthOptions {
    pub quick: bool,
    pub category: Option<HealthCategory>,
}

impl HealthOptions {
    /// `category` wins over `quick`; quick mode keeps only critical categories.
    pub fn categories(&self) -> Vec<HealthCategory> {
        match self.category {
            Some(category) => vec![category],
            None => HealthCategory::ALL
                .into_iter()
                .filter(|category| !self.quick || category.is_critical())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub exit_code: i32,
    pub generated_at: DateTime<Utc>,
    pub quick: bool,
    pub target_category: Option<HealthCategory>,
    pub total_checks: usize,
    pub passed: usize,
    pub failed: usize,
    pub warned: usize,
    pub total_elapsed_ms: u64,
    pub categories: BTreeMap<HealthCategory, Vec<CheckResult>>,
    pub critical_failures: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl HealthReport {
    pub fn from_results(
        results: Vec<CheckResult>,
        options: &HealthOptions,
        config: Option<Value>,
    ) -> Self {
        let status = OverallStatus::from_results(&results);
        let count = |status: CheckStatus| results.iter().filter(|r| r.status == status).count();
        let (passed, failed, warned) = (
            count(CheckStatus::Pass),
            count(CheckStatus::Fail),
            count(CheckStatus::Warn),
        );

        let critical_failures = results
            .iter()
            .filter(|result| result.critical && result.failed())
            .map(CheckResult::label)
            .collect();

        let mut warnings = results
            .iter()
            .filter(|result| result.status == CheckStatus::Warn)
            .map(CheckResult::label)
            .collect::<Vec<_>>();
        let mut recommendations = Vec::new();

        let slow = results
            .iter()
            .filter(|result| result.elapsed_ms > SLOW_CHECK_MS)
            .count();
        if slow > 0 {
            warnings.push(format!("{slow} checks took longer than 5 seconds"));
            recommendations
                .push("Consider optimizing slow operations or increasing NEO_API_TIMEOUT".to_string());
        }
        let failed_in = |category: HealthCategory| {
            results
                .iter()
                .any(|result| result.category == category && result.failed())
        };
        if failed_in(HealthCategory::Authentication) {
            warnings.push("Authentication issues detected".to_string());
            recommendations.push("Verify API credentials and network connectivity".to_string());
        }
        if failed_in(HealthCategory::ToolsRegistry) {
            warnings.push("Tool registry issues detected".to_string());
            recommendations.push("Check the tool catalog file and NEO_CATALOG_PATH".to_string());
        }

        let total_elapsed_ms = results.iter().map(|result| result.elapsed_ms).sum();
        let total_checks = results.len();
        let mut categories: BTreeMap<HealthCategory, Vec<CheckResult>> = BTreeMap::new();
        for result in results {
            categories.entry(result.category).or_default().push(result);
        }

        Self {
            status,
            exit_code: status.exit_code(),
            generated_at: Utc::now(),
            quick: options.quick,
            target_category: options.category,
            total_checks,
            passed,
            failed,
            warned,
            total_elapsed_ms,
            categories,
            critical_failures,
            warnings,
            recommendations,
            config,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickReport {
    pub passed: bool,
    pub exit_code: i32,
    pub checks: Vec<CheckResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessPhase {
    Idle,
    Configuring,
    Running(HealthCategory),
    Aggregating,
    Done,
}

impl HarnessPhase {
    pub fn can_advance_to(self, next: HarnessPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Configuring)
                | (Self::Configuring, Self::Running(_))
                | (Self::Configuring, Self::Aggregating)
                | (Self::Running(_), Self::Running(_))
                | (Self::Running(_), Self::Aggregating)
                | (Self::Aggregating, Self::Done)
        )
    }
}

impl fmt::Display for HarnessPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Configuring => f.write_str("configuring"),
            Self::Running(category) => write!(f, "running({category})"),
            Self::Aggregating => f.write_str("aggregating"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// Drives one health run. Startup failures are captured as data so the
/// configuration and registry checks can report them instead of aborting.
pub struct HealthChecker {
    config: Result<Config, String>,
    dispatcher: Result<Arc<Dispatcher>, String>,
    phase: HarnessPhase,
}

impl HealthChecker {
    pub fn new(config: Result<Config, String>, dispatcher: Result<Arc<Dispatcher>, String>) -> Self {
        Self {
            config,
            dispatcher,
            phase: HarnessPhase::Idle,
        }
    }

    pub fn phase(&self) -> HarnessPhase {
        self.phase
    }

    fn advance(&mut self, next: HarnessPhase) -> Result<(), HarnessError> {
        if !self.phase.can_advance_to(next) {
            return Err(HarnessError::InvalidTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        self.phase = next;
        Ok(())
    }

    pub async fn run(mut self, options: &HealthOptions) -> Result<HealthReport, HarnessError> {
        self.advance(HarnessPhase::Configuring)?;
        let categories = options.categories();
        info!(
            quick = options.quick,
            categories = categories.len(),
            "health check starting"
        );

        let mut results = Vec::new();
        for category in categories {
            self.advance(HarnessPhase::Running(category))?;
            for check in category.checks() {
                results.push(self.run_check(category, *check).await);
            }
        }

        self.advance(HarnessPhase::Aggregating)?;
        let config = self.config.as_ref().ok().map(Config::summary);
        let report = HealthReport::from_results(results, options, config);
        self.advance(HarnessPhase::Done)?;

        info!(
            status = %report.status,
            passed = report.passed,
            failed = report.failed,
            warned = report.warned,
            "health check finished"
        );
        Ok(report)
    }

    /// Configuration, connectivity, registry size and one hotel search.
    pub async fn quick_check(mut self) -> Result<QuickReport, HarnessError> {
        self.advance(HarnessPhase::Configuring)?;
        let plan = [
            (HealthCategory::Configuration, Check::ConfigValidation),
            (HealthCategory::Connectivity, Check::ApiConnectivity),
            (HealthCategory::ToolsRegistry, Check::ToolsLoaded),
            (HealthCategory::BasicEndpoints, Check::HotelSearch),
        ];

        let mut checks = Vec::with_capacity(plan.len());
        for (category, check) in plan {
            self.advance(HarnessPhase::Running(category))?;
            checks.push(self.run_check(category, check).await);
        }

        self.advance(HarnessPhase::Aggregating)?;
        let passed = checks.iter().all(|check| check.status == CheckStatus::Pass);
        self.advance(HarnessPhase::Done)?;

        Ok(QuickReport {
            passed,
            exit_code: if passed { EXIT_OK } else { EXIT_PARTIAL },
            checks,
        })
    }

    async fn run_check(&self, category: HealthCategory, check: Check) -> CheckResult {
        let started_at = Instant::now();
        let outcome = self.execute(check).await;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;

        let result = CheckResult {
            name: check,
            category,
            status: outcome.status,
            critical: category.is_critical(),
            elapsed_ms,
            grade: check
                .is_timed()
                .then(|| grade_outcome(elapsed_ms, outcome.status != CheckStatus::Fail)),
            detail: outcome.detail,
            data: outcome.data,
        };

        match result.status {
            CheckStatus::Fail => warn!(
                category = %category,
                check = %check,
                elapsed_ms,
                detail = %result.detail,
                "health check failed"
            ),
            _ => info!(
                category = %category,
                check = %check,
                status = ?result.status,
                elapsed_ms,
                "health check finished"
            ),
        }
        result
    }

    fn language(&self) -> &str {
        self.config
            .as_ref()
            .map(|config| config.default_language.as_str())
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    async fn execute(&self, check: Check) -> Outcome {
        match check {
            Check::ConfigValidation => {
                return match &self.config {
                    Ok(config) => Outcome::pass("configuration is valid").with_data(config.summary()),
                    Err(err) => Outcome::fail(err.clone()),
                }
            }
            Check::EnvironmentCheck => {
                return match &self.config {
                    Ok(config) if config.defaulted.is_empty() => {
                        Outcome::pass("all settings supplied by the environment")
                    }
                    Ok(config) => Outcome::warn(format!(
                        "using built-in defaults for {}",
                        config.defaulted.join(", ")
                    ))
                    .with_data(json!({ "defaulted": config.defaulted })),
                    Err(err) => Outcome::fail(err.clone()),
                }
            }
            _ => {}
        }

        let dispatcher = match &self.dispatcher {
            Ok(dispatcher) => dispatcher,
            Err(err) => return Outcome::fail(format!("dispatcher unavailable: {err}")),
        };

        match check {
            Check::ConfigValidation | Check::EnvironmentCheck => {
                Outcome::fail("configuration checks run without a dispatcher")
            }
            Check::ApiConnectivity => match dispatcher.backend().authenticate(self.language()).await {
                Ok(_) => Outcome::pass("booking API reachable"),
                Err(err) if err.kind() == ErrorKind::Auth && err.api_reached() => Outcome::warn(format!(
                    "booking API reachable but rejected the credentials: {err}"
                )),
                Err(err) => Outcome::fail(format!("{}: {err}", err.kind())),
            },
            Check::AuthTest => match dispatcher.backend().authenticate(self.language()).await {
                Ok(session) => Outcome::pass(format!(
                    "session valid until {}",
                    session.expires_at.to_rfc3339()
                ))
                .with_data(json!(session)),
                Err(err) => Outcome::fail(format!("{}: {err}", err.kind())),
            },
            Check::TokenValidation => {
                match dispatcher
                    .call("hotel_search_rq", json!({"page": 1, "num_results": 1}))
                    .await
                {
                    InvocationResult::Success { .. } => Outcome::pass("session token accepted"),
                    InvocationResult::Failure {
                        kind: ErrorKind::Auth,
                        message,
                        ..
                    } => Outcome::fail(format!("session token rejected: {message}")),
                    InvocationResult::Failure { kind, message, .. } => {
                        Outcome::fail(format!("{kind}: {message}"))
                    }
                }
            }
            Check::ToolsLoaded => {
                let count = dispatcher.registry().len();
                let detail = format!("{count}/{EXPECTED_TOOL_COUNT} tools registered");
                if count == EXPECTED_TOOL_COUNT {
                    Outcome::pass(detail)
                } else {
                    Outcome::fail(detail)
                }
            }
            Check::CategoryCounts => {
                let counts = dispatcher.registry().count_by_category();
                let mismatched = Category::ALL
                    .into_iter()
                    .filter(|category| {
                        counts.get(category).copied().unwrap_or(0) != category.expected_count()
                    })
                    .map(Category::as_str)
                    .collect::<Vec<_>>();
                let outcome = if mismatched.is_empty() {
                    Outcome::pass(format!("{} categories complete", Category::ALL.len()))
                } else {
                    Outcome::fail(format!("unexpected tool counts in {}", mismatched.join(", ")))
                };
                outcome.with_data(json!(counts))
            }
            Check::SchemaValidation => {
                let registry = dispatcher.registry();
                let broken = registry
                    .list_tools()
                    .iter()
                    .filter(|descriptor| {
                        let sample = Value::Object(sample_arguments(&descriptor.input_schema));
                        descriptor.input_schema.validate_arguments(sample).is_err()
                    })
                    .map(|descriptor| descriptor.name.as_str())
                    .collect::<Vec<_>>();
                if broken.is_empty() {
                    Outcome::pass(format!("{} input schemas accept sample arguments", registry.len()))
                } else {
                    Outcome::fail(format!("schemas reject their own samples: {}", broken.join(", ")))
                }
            }
            Check::HotelSearch => endpoint(dispatcher, "hotel_search_rq", hotel_search_arguments()).await,
            Check::ZoneSearch => {
                endpoint(
                    dispatcher,
                    "zone_search_rq",
                    json!({"order_by": "alphabetical", "order_type": "asc"}),
                )
                .await
            }
            Check::BudgetSearch => {
                endpoint(
                    dispatcher,
                    "budget_search_rq",
                    json!({"order_by": "creationdate", "order_type": "desc", "page": 1, "num_results": 5}),
                )
                .await
            }
            Check::PackageDetails => {
                endpoint(dispatcher, "package_details_rq", json!({"status": "enabled"})).await
            }
            Check::OrderSearch => {
                endpoint(
                    dispatcher,
                    "order_search_rq",
                    json!({"order_by": "creationdate", "order_type": "desc", "page": 1, "num_results": 1}),
                )
                .await
            }
            Check::GenericProductDetails => {
                endpoint(dispatcher, "generic_product_details_rq", json!({"status": "enabled"})).await
            }
            Check::ResponseTimes => self.response_times(dispatcher).await,
            Check::ConcurrentRequests => {
                let series = run_concurrent(
                    dispatcher,
                    "concurrent_requests",
                    "hotel_search_rq",
                    &hotel_search_arguments(),
                    HEALTH_CONCURRENCY,
                    1,
                )
                .await;
                let detail = format!(
                    "{}/{} parallel searches succeeded ({:.1} req/s)",
                    series.successes, series.runs, series.throughput_per_sec
                );
                let outcome = if series.successes == series.runs {
                    Outcome::pass(detail)
                } else if series.successes == 0 {
                    Outcome::fail(detail)
                } else {
                    Outcome::warn(detail)
                };
                outcome.with_data(json!(series))
            }
            Check::InvalidRequests => {
                match dispatcher
                    .call("hotel_search_rq", json!({"page": -1, "num_results": 1000}))
                    .await
                {
                    InvocationResult::Failure {
                        kind: ErrorKind::Validation,
                        message,
                        ..
                    } => Outcome::pass(format!("invalid arguments rejected: {message}")),
                    InvocationResult::Failure { kind, message, .. } => Outcome::fail(format!(
                        "expected a validation error, got {kind}: {message}"
                    )),
                    InvocationResult::Success { .. } => {
                        Outcome::fail("invalid arguments were accepted")
                    }
                }
            }
            Check::UnknownTool => match dispatcher.call("nonexistent_tool_rq", json!({})).await {
                InvocationResult::Failure {
                    kind: ErrorKind::UnknownTool,
                    ..
                } => Outcome::pass("unknown tool names are rejected"),
                other => Outcome::fail(format!("unexpected result for unknown tool: {other:?}")),
            },
        }
    }

    async fn response_times(&self, dispatcher: &Arc<Dispatcher>) -> Outcome {
        let started_at = Instant::now();
        if let Err(err) = dispatcher.backend().authenticate(self.language()).await {
            return Outcome::fail(format!("authentication failed: {err}"));
        }
        let auth_ms = started_at.elapsed().as_millis() as u64;

        let search = dispatcher.call("hotel_search_rq", hotel_search_arguments()).await;
        if let InvocationResult::Failure { kind, message, .. } = &search {
            return Outcome::fail(format!("hotel search failed: {kind}: {message}"));
        }
        let search_ms = search.elapsed_ms();

        let grade = grade_latency(auth_ms as f64).max(grade_latency(search_ms as f64));
        let detail = format!("auth {auth_ms} ms, search {search_ms} ms, grade {grade}");
        let outcome = if grade >= Grade::D {
            Outcome::warn(detail)
        } else {
            Outcome::pass(detail)
        };
        outcome.with_data(json!({
            "auth_ms": auth_ms,
            "search_ms": search_ms,
            "grade": grade,
        }))
    }
}

async fn endpoint(dispatcher: &Dispatcher, tool: &str, arguments: Value) -> Outcome {
    match dispatcher.call(tool, arguments).await {
        InvocationResult::Success {
            payload,
            elapsed_ms,
        } => Outcome::pass(format!(
            "{tool} answered in {elapsed_ms} ms: {}",
            snippet(&payload.to_string(), SNIPPET_LIMIT)
        )),
        InvocationResult::Failure { kind, message, .. } => {
            Outcome::fail(format!("{tool} failed with {kind}: {message}"))
        }
    }
}
