//! Latency and throughput benchmarks over read-only tools.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::dispatcher::{Dispatcher, InvocationResult};
use crate::harness::{
    grade::{grade_latency, Grade},
    HarnessError, EXIT_CRITICAL, EXIT_OK, EXIT_PARTIAL,
};

pub const MAX_CONCURRENCY: usize = 20;
pub const CONCURRENT_ROUNDS: usize = 5;

const SLOW_MEAN_MS: f64 = 3000.0;
const RELIABLE_SUCCESS_RATE: f64 = 90.0;
const MIN_THROUGHPUT_PER_SEC: f64 = 1.0;
const MAX_REPORTED_ERRORS: usize = 5;

/// Summary statistics over a set of latency samples in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
}

impl LatencyStats {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        let middle = count / 2;
        let median_ms = if count % 2 == 0 {
            (sorted[middle - 1] + sorted[middle]) / 2.0
        } else {
            sorted[middle]
        };

        Some(Self {
            count,
            min_ms: sorted[0],
            max_ms: sorted[count - 1],
            mean_ms: sorted.iter().sum::<f64>() / count as f64,
            median_ms,
            p95_ms: nearest_rank(&sorted, 95.0),
        })
    }
}

/// Nearest-rank percentile over an ascending, non-empty slice.
pub fn nearest_rank(sorted: &[f64], percentile: f64) -> f64 {
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesReport {
    pub name: String,
    pub tool: String,
    pub runs: usize,
    pub successes: usize,
    pub failures: usize,
    pub success_rate: f64,
    pub wall_ms: u64,
    pub throughput_per_sec: f64,
    pub latency: Option<LatencyStats>,
    pub grade: Grade,
    pub errors: Vec<String>,
}

impl SeriesReport {
    fn from_outcomes(name: &str, tool: &str, outcomes: &[InvocationResult], wall: Duration) -> Self {
        let samples = outcomes
            .iter()
            .filter(|outcome| outcome.is_success())
            .map(|outcome| outcome.elapsed_ms() as f64)
            .collect::<Vec<_>>();
        let mut errors = Vec::new();
        for outcome in outcomes {
            if let InvocationResult::Failure { kind, message, .. } = outcome {
                let line = format!("{kind}: {message}");
                if errors.len() < MAX_REPORTED_ERRORS && !errors.contains(&line) {
                    errors.push(line);
                }
            }
        }

        let runs = outcomes.len();
        let successes = samples.len();
        let latency = LatencyStats::from_samples(&samples);
        let wall_secs = wall.as_secs_f64();

        Self {
            name: name.to_string(),
            tool: tool.to_string(),
            runs,
            successes,
            failures: runs - successes,
            success_rate: percentage(successes, runs),
            wall_ms: wall.as_millis() as u64,
            throughput_per_sec: if wall_secs > 0.0 {
                successes as f64 / wall_secs
            } else {
                0.0
            },
            grade: latency
                .as_ref()
                .map(|stats| grade_latency(stats.mean_ms))
                .unwrap_or(Grade::F),
            latency,
            errors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkOptions {
    pub quick: bool,
    pub concurrent: usize,
}

impl BenchmarkOptions {
    pub fn new(quick: bool, concurrent: usize) -> Result<Self, HarnessError> {
        if !(1..=MAX_CONCURRENCY).contains(&concurrent) {
            return Err(HarnessError::InvalidConcurrency {
                got: concurrent,
                max: MAX_CONCURRENCY,
            });
        }
        Ok(Self { quick, concurrent })
    }

    fn runs(&self, full: usize, quick: usize) -> usize {
        if self.quick {
            quick
        } else {
            full
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub generated_at: DateTime<Utc>,
    pub quick: bool,
    pub concurrency: usize,
    pub series: Vec<SeriesReport>,
    pub total_runs: usize,
    pub total_successes: usize,
    pub success_rate: f64,
    pub recommendations: Vec<String>,
    pub exit_code: i32,
}

impl BenchmarkReport {
    pub fn from_series(options: &BenchmarkOptions, series: Vec<SeriesReport>) -> Result<Self, HarnessError> {
        let total_runs = series.iter().map(|item| item.runs).sum::<usize>();
        if total_runs == 0 {
            return Err(HarnessError::NoResults);
        }
        let total_successes = series.iter().map(|item| item.successes).sum::<usize>();
        let success_rate = percentage(total_successes, total_runs);

        Ok(Self {
            generated_at: Utc::now(),
            quick: options.quick,
            concurrency: options.concurrent,
            recommendations: recommendations(&series),
            series,
            total_runs,
            total_successes,
            success_rate,
            exit_code: exit_code_for(success_rate),
        })
    }
}

pub fn exit_code_for(success_rate: f64) -> i32 {
    if success_rate >= 90.0 {
        EXIT_OK
    } else if success_rate >= 50.0 {
        EXIT_PARTIAL
    } else {
        EXIT_CRITICAL
    }
}

fn recommendations(series: &[SeriesReport]) -> Vec<String> {
    let names = |predicate: &dyn Fn(&SeriesReport) -> bool| {
        series
            .iter()
            .filter(|item| predicate(item))
            .map(|item| item.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut recommendations = Vec::new();
    let slow = names(&|item: &SeriesReport| {
        item.latency
            .as_ref()
            .is_some_and(|stats| stats.mean_ms > SLOW_MEAN_MS)
    });
    if !slow.is_empty() {
        recommendations.push(format!("Optimize slow operations: {slow}"));
    }
    let unreliable =
        names(&|item: &SeriesReport| item.success_rate < RELIABLE_SUCCESS_RATE);
    if !unreliable.is_empty() {
        recommendations.push(format!("Investigate reliability issues in: {unreliable}"));
    }
    let low_throughput = names(&|item: &SeriesReport| {
        item.successes > 0 && item.throughput_per_sec < MIN_THROUGHPUT_PER_SEC
    });
    if !low_throughput.is_empty() {
        recommendations.push(format!("Improve throughput for: {low_throughput}"));
    }
    recommendations
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

struct Series {
    name: &'static str,
    tool: &'static str,
    arguments: Value,
    full_runs: usize,
    quick_runs: usize,
}

fn sequential_series() -> Vec<Series> {
    vec![
        Series {
            name: "authentication",
            tool: "authenticator_rq",
            arguments: json!({}),
            full_runs: 10,
            quick_runs: 3,
        },
        Series {
            name: "hotel_search",
            tool: "hotel_search_rq",
            arguments: hotel_search_arguments(),
            full_runs: 20,
            quick_runs: 5,
        },
        Series {
            name: "zone_search",
            tool: "zone_search_rq",
            arguments: json!({"order_by": "alphabetical", "order_type": "asc"}),
            full_runs: 15,
            quick_runs: 3,
        },
        Series {
            name: "budget_search",
            tool: "budget_search_rq",
            arguments: json!({
                "order_by": "creationdate",
                "order_type": "desc",
                "page": 1,
                "num_results": 5
            }),
            full_runs: 10,
            quick_runs: 3,
        },
    ]
}

pub fn hotel_search_arguments() -> Value {
    json!({"page": 1, "num_results": 5})
}

pub struct Benchmark {
    dispatcher: Arc<Dispatcher>,
}

impl Benchmark {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub async fn run(&self, options: &BenchmarkOptions) -> Result<BenchmarkReport, HarnessError> {
        info!(quick = options.quick, concurrency = options.concurrent, "benchmark starting");
        let mut series = Vec::new();

        for definition in sequential_series() {
            let runs = options.runs(definition.full_runs, definition.quick_runs);
            let report = self
                .run_sequential(definition.name, definition.tool, &definition.arguments, runs)
                .await;
            log_series(&report);
            series.push(report);
        }

        let rounds = options.runs(CONCURRENT_ROUNDS, 1);
        let report = run_concurrent(
            &self.dispatcher,
            "concurrent",
            "hotel_search_rq",
            &hotel_search_arguments(),
            options.concurrent,
            rounds,
        )
        .await;
        log_series(&report);
        series.push(report);

        BenchmarkReport::from_series(options, series)
    }

    async fn run_sequential(&self, name: &str, tool: &str, arguments: &Value, runs: usize) -> SeriesReport {
        let started_at = Instant::now();
        let mut outcomes = Vec::with_capacity(runs);
        for _ in 0..runs {
            outcomes.push(self.dispatcher.call(tool, arguments.clone()).await);
        }
        SeriesReport::from_outcomes(name, tool, &outcomes, started_at.elapsed())
    }
}

/// Issues `width` parallel calls per round. Throughput uses the wall time
/// across all rounds.
pub async fn run_concurrent(
    dispatcher: &Arc<Dispatcher>,
    name: &str,
    tool: &str,
    arguments: &Value,
    width: usize,
    rounds: usize,
) -> SeriesReport {
    let started_at = Instant::now();
    let mut outcomes = Vec::with_capacity(width * rounds);

    for _ in 0..rounds {
        let mut tasks = JoinSet::new();
        for _ in 0..width {
            let dispatcher = Arc::clone(dispatcher);
            let tool = tool.to_string();
            let arguments = arguments.clone();
            tasks.spawn(async move { dispatcher.call(&tool, arguments).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(error = %err, "benchmark task did not complete");
                    outcomes.push(InvocationResult::Failure {
                        kind: crate::errors::ErrorKind::Remote,
                        message: format!("task did not complete: {err}"),
                        elapsed_ms: 0,
                    });
                }
            }
        }
    }

    SeriesReport::from_outcomes(name, tool, &outcomes, started_at.elapsed())
}

fn log_series(report: &SeriesReport) {
    info!(
        series = %report.name,
        runs = report.runs,
        successes = report.successes,
        mean_ms = report.latency.as_ref().map(|stats| stats.mean_ms).unwrap_or(0.0),
        grade = %report.grade,
        "benchmark series finished"
    );
}
