//! Command-line surface: the MCP server plus the diagnostic harness.

use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{error, info};

use crate::{
    build_app, build_dispatcher,
    config::Config,
    dispatcher::Dispatcher,
    harness::{
        benchmark::{Benchmark, BenchmarkOptions, BenchmarkReport},
        endpoint::EndpointTester,
        health::{CheckResult, CheckStatus, HealthCategory, HealthChecker, HealthOptions, HealthReport},
        write_report, HarnessError, EXIT_HARNESS_ERROR, EXIT_OK,
    },
    mcp::stdio::serve_stdio,
    AppState, StartupError,
};

const EXIT_SERVER_FAILURE: i32 = 1;

#[derive(Debug, Parser)]
#[command(name = "neobookings-mcp", version)]
#[command(about = "MCP server exposing the Neobookings booking API as tools", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn is_serve(&self) -> bool {
        matches!(self.command, None | Some(Command::Serve { .. }))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve MCP over stdio, or over HTTP with --http
    Serve {
        /// Listen on BIND_ADDR:BIND_PORT instead of stdio
        #[arg(long)]
        http: bool,
    },
    /// Configuration, connectivity, registry and one hotel search
    Quick,
    /// Run categorized health checks
    Health {
        /// Run a single category
        #[arg(short, long)]
        category: Option<String>,
        /// Run only the critical categories
        #[arg(short, long)]
        quick: bool,
        /// Write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print check details
        #[arg(short, long)]
        verbose: bool,
    },
    /// List, describe or call individual tools
    Endpoint {
        /// List tools grouped by category
        #[arg(long)]
        list_tools: bool,
        /// Show a tool's operation and input schema
        #[arg(long, value_name = "TOOL")]
        info: Option<String>,
        /// Call a tool once
        #[arg(long, value_name = "TOOL")]
        tool: Option<String>,
        /// JSON arguments for --tool; sample arguments are generated when omitted
        #[arg(long, value_name = "JSON", requires = "tool")]
        args: Option<String>,
        /// Permit tools that change remote state
        #[arg(long)]
        allow_mutating: bool,
    },
    /// Measure latency and throughput of read-only tools
    Benchmark {
        /// Fewer runs per series
        #[arg(short, long)]
        quick: bool,
        /// Parallel requests per round in the concurrent series (1-20)
        #[arg(short, long, default_value_t = 1)]
        concurrent: usize,
        /// Write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Runs a command and returns the process exit code.
pub async fn run(cli: Cli) -> i32 {
    let command = cli.command.unwrap_or(Command::Serve { http: false });
    let outcome = match command {
        Command::Serve { http } => {
            return match serve(http).await {
                Ok(()) => EXIT_OK,
                Err(err) => {
                    error!(error = %err, "server stopped with error");
                    eprintln!("error: {err}");
                    EXIT_SERVER_FAILURE
                }
            }
        }
        Command::Quick => quick().await,
        Command::Health {
            category,
            quick,
            output,
            verbose,
        } => health(category.as_deref(), quick, output, verbose).await,
        Command::Endpoint {
            list_tools,
            info,
            tool,
            args,
            allow_mutating,
        } => endpoint(list_tools, info, tool, args, allow_mutating).await,
        Command::Benchmark {
            quick,
            concurrent,
            output,
        } => benchmark(quick, concurrent, output).await,
    };

    outcome.unwrap_or_else(|err| {
        error!(error = %err, "harness execution failed");
        eprintln!("error: {err}");
        err.exit_code()
    })
}

async fn serve(http: bool) -> Result<(), StartupError> {
    let config = Config::from_env()?;
    let dispatcher = Arc::new(build_dispatcher(&config)?);
    info!(
        base_url = %config.base_url,
        tools = dispatcher.registry().len(),
        "booking dispatcher ready"
    );

    if !http {
        return Ok(serve_stdio(AppState::new(dispatcher, None)).await?);
    }

    let api_token = config.require_api_token()?.to_string();
    let bind_socket = config.bind_socket()?;
    let app = build_app(AppState::new(dispatcher, Some(api_token)));
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = %config.bind_port,
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Startup failures are kept as messages so health checks can report them.
fn load_runtime() -> (Result<Config, String>, Result<Arc<Dispatcher>, String>) {
    match Config::from_env() {
        Ok(config) => {
            let dispatcher = build_dispatcher(&config)
                .map(Arc::new)
                .map_err(|err| err.to_string());
            (Ok(config), dispatcher)
        }
        Err(err) => (
            Err(err.to_string()),
            Err(format!("configuration is invalid: {err}")),
        ),
    }
}

fn require_dispatcher() -> Result<Arc<Dispatcher>, HarnessError> {
    let config = Config::from_env().map_err(|err| HarnessError::Startup(err.to_string()))?;
    build_dispatcher(&config)
        .map(Arc::new)
        .map_err(|err| HarnessError::Startup(err.to_string()))
}

async fn quick() -> Result<i32, HarnessError> {
    let (config, dispatcher) = load_runtime();
    let report = HealthChecker::new(config, dispatcher).quick_check().await?;

    for check in &report.checks {
        println!("{}", check_line(check));
    }
    println!(
        "\nquick check {}",
        if report.passed { "passed" } else { "failed" }
    );
    Ok(report.exit_code)
}

async fn health(
    category: Option<&str>,
    quick: bool,
    output: Option<PathBuf>,
    verbose: bool,
) -> Result<i32, HarnessError> {
    let category = category.map(str::parse::<HealthCategory>).transpose()?;
    let options = HealthOptions { quick, category };

    let (config, dispatcher) = load_runtime();
    let report = HealthChecker::new(config, dispatcher).run(&options).await?;
    print_health(&report, verbose);

    if let Some(path) = output {
        write_report(&path, &report)?;
        println!("\nreport written to {}", path.display());
    }
    Ok(report.exit_code)
}

async fn endpoint(
    list_tools: bool,
    info: Option<String>,
    tool: Option<String>,
    args: Option<String>,
    allow_mutating: bool,
) -> Result<i32, HarnessError> {
    let tester = EndpointTester::new(require_dispatcher()?, allow_mutating);

    if list_tools {
        print!("{}", tester.list_tools());
        return Ok(EXIT_OK);
    }
    if let Some(name) = info {
        print!("{}", tester.tool_info(&name)?);
        return Ok(EXIT_OK);
    }
    if let Some(name) = tool {
        let run = tester.test_tool(&name, args.as_deref()).await?;
        print!("{}", run.render());
        return Ok(run.exit_code());
    }

    tester
        .interactive(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    Ok(EXIT_OK)
}

async fn benchmark(
    quick: bool,
    concurrent: usize,
    output: Option<PathBuf>,
) -> Result<i32, HarnessError> {
    let options = BenchmarkOptions::new(quick, concurrent)?;
    let report = Benchmark::new(require_dispatcher()?).run(&options).await?;
    print_benchmark(&report);

    if let Some(path) = output {
        write_report(&path, &report)?;
        println!("\nreport written to {}", path.display());
    }
    Ok(report.exit_code)
}

fn check_line(check: &CheckResult) -> String {
    let status = match check.status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
    };
    let grade = check
        .grade
        .map(|grade| format!(" grade {grade}"))
        .unwrap_or_default();
    format!(
        "  {status} {} ({} ms{grade}) {}",
        check.name, check.elapsed_ms, check.detail
    )
}

fn print_health(report: &HealthReport, verbose: bool) {
    for (category, checks) in &report.categories {
        let tier = if category.is_critical() { "critical" } else { "advisory" };
        println!("{category} [{tier}]");
        for check in checks {
            println!("{}", check_line(check));
            if verbose {
                if let Some(data) = &check.data {
                    println!("      {data}");
                }
            }
        }
    }

    println!(
        "\nOverall status: {} ({} passed, {} failed, {} warnings, {} ms)",
        report.status, report.passed, report.failed, report.warned, report.total_elapsed_ms
    );
    for (title, lines) in [
        ("Critical failures", &report.critical_failures),
        ("Warnings", &report.warnings),
        ("Recommendations", &report.recommendations),
    ] {
        if lines.is_empty() {
            continue;
        }
        println!("{title}:");
        for line in lines {
            println!("  - {line}");
        }
    }
}

fn print_benchmark(report: &BenchmarkReport) {
    for series in &report.series {
        match &series.latency {
            Some(stats) => println!(
                "{:<15} {:>3}/{:<3} ok  mean {:>8.1} ms  median {:>8.1}  p95 {:>8.1}  min {:>8.1}  max {:>8.1}  {:>6.2} req/s  grade {}",
                series.name,
                series.successes,
                series.runs,
                stats.mean_ms,
                stats.median_ms,
                stats.p95_ms,
                stats.min_ms,
                stats.max_ms,
                series.throughput_per_sec,
                series.grade
            ),
            None => println!(
                "{:<15} {:>3}/{:<3} ok  grade {}",
                series.name, series.successes, series.runs, series.grade
            ),
        }
        for line in &series.errors {
            println!("    {line}");
        }
    }

    println!(
        "\n{} of {} calls succeeded ({:.1}%)",
        report.total_successes, report.total_runs, report.success_rate
    );
    for line in &report.recommendations {
        println!("  - {line}");
    }
}

/// Maps a clap parse failure onto the exit-code contract.
pub fn parse_error_exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() {
        EXIT_HARNESS_ERROR
    } else {
        EXIT_OK
    }
}
