//! Single-shot and interactive tool tester.

use std::{fmt::Write as _, sync::Arc};

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::catalog::{Category, ToolDescriptor};
use crate::dispatcher::{Dispatcher, InvocationResult};
use crate::domain::utils::sample_arguments;
use crate::harness::{HarnessError, EXIT_OK, EXIT_PARTIAL};

const HELP: &str = "commands: list | info <tool> | test <tool> [json arguments] | quit\n";

#[derive(Debug, Clone)]
pub struct ToolRun {
    pub tool: String,
    pub arguments: Value,
    pub result: InvocationResult,
}

impl ToolRun {
    pub fn exit_code(&self) -> i32 {
        if self.result.is_success() {
            EXIT_OK
        } else {
            EXIT_PARTIAL
        }
    }

    pub fn render(&self) -> String {
        let arguments = serde_json::to_string(&self.arguments).unwrap_or_default();
        match &self.result {
            InvocationResult::Success {
                payload,
                elapsed_ms,
            } => format!(
                "{} {} -> success in {elapsed_ms} ms\n{}\n",
                self.tool,
                arguments,
                serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
            ),
            InvocationResult::Failure {
                kind,
                message,
                elapsed_ms,
            } => format!(
                "{} {} -> failed in {elapsed_ms} ms\n{kind}: {message}\n",
                self.tool, arguments
            ),
        }
    }
}

pub struct EndpointTester {
    dispatcher: Arc<Dispatcher>,
    allow_mutating: bool,
}

impl EndpointTester {
    pub fn new(dispatcher: Arc<Dispatcher>, allow_mutating: bool) -> Self {
        Self {
            dispatcher,
            allow_mutating,
        }
    }

    /// Tool names grouped by category, mutating tools marked.
    pub fn list_tools(&self) -> String {
        let registry = self.dispatcher.registry();
        let mut output = String::new();
        for category in Category::ALL {
            let tools = registry.by_category(category).collect::<Vec<_>>();
            if tools.is_empty() {
                continue;
            }
            let _ = writeln!(output, "{category} ({})", tools.len());
            for descriptor in tools {
                let marker = if descriptor.mutating { " [mutating]" } else { "" };
                let _ = writeln!(output, "  {}{marker}", descriptor.name);
            }
        }
        let _ = writeln!(output, "{} tools", registry.len());
        output
    }

    pub fn tool_info(&self, name: &str) -> Result<String, HarnessError> {
        let descriptor = self.dispatcher.registry().get(name)?;
        let schema = serde_json::to_string_pretty(&descriptor.input_schema.to_input_schema())?;

        let mut output = String::new();
        let _ = writeln!(output, "name:        {}", descriptor.name);
        let _ = writeln!(output, "category:    {}", descriptor.category);
        let _ = writeln!(output, "mutating:    {}", descriptor.mutating);
        let _ = writeln!(
            output,
            "operation:   {} {}",
            descriptor.operation.method.as_str(),
            descriptor.operation.path
        );
        let _ = writeln!(output, "description: {}", descriptor.description);
        let _ = writeln!(output, "input schema:\n{schema}");
        Ok(output)
    }

    /// Parses the supplied JSON or falls back to generated sample arguments.
    pub fn arguments_for(
        &self,
        descriptor: &ToolDescriptor,
        raw: Option<&str>,
    ) -> Result<Value, HarnessError> {
        match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|err| HarnessError::InvalidArguments(err.to_string())),
            None => Ok(Value::Object(sample_arguments(&descriptor.input_schema))),
        }
    }

    pub async fn test_tool(&self, name: &str, raw_arguments: Option<&str>) -> Result<ToolRun, HarnessError> {
        let descriptor = self.dispatcher.registry().get(name)?;
        if descriptor.mutating && !self.allow_mutating {
            return Err(HarnessError::MutatingRefused(descriptor.name.to_string()));
        }

        let arguments = self.arguments_for(descriptor, raw_arguments)?;
        let result = self.dispatcher.call(name, arguments.clone()).await;
        Ok(ToolRun {
            tool: descriptor.name.to_string(),
            arguments,
            result,
        })
    }

    /// Reads commands until `quit` or end of input. Command errors are printed
    /// and the prompt continues.
    pub async fn interactive<R, W>(&self, reader: R, mut writer: W) -> Result<(), HarnessError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        writer.write_all(HELP.as_bytes()).await?;

        loop {
            writer.write_all(b"> ").await?;
            writer.flush().await?;
            let Some(line) = lines.next_line().await? else {
                break;
            };

            let line = line.trim();
            let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let rest = rest.trim();

            let output = match command {
                "" => continue,
                "quit" | "exit" => break,
                "help" => HELP.to_string(),
                "list" => self.list_tools(),
                "info" if !rest.is_empty() => self
                    .tool_info(rest)
                    .unwrap_or_else(|err| format!("error: {err}\n")),
                "test" if !rest.is_empty() => {
                    let (tool, arguments) = rest
                        .split_once(char::is_whitespace)
                        .map(|(tool, arguments)| (tool, Some(arguments)))
                        .unwrap_or((rest, None));
                    match self.test_tool(tool, arguments).await {
                        Ok(run) => run.render(),
                        Err(err) => format!("error: {err}\n"),
                    }
                }
                _ => format!("unrecognized command '{line}'\n{HELP}"),
            };
            writer.write_all(output.as_bytes()).await?;
        }

        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::dispatcher::tests::{dispatcher_with, CountingBackend};
    use crate::errors::ErrorKind;

    fn tester(backend: Arc<CountingBackend>, allow_mutating: bool) -> EndpointTester {
        EndpointTester::new(Arc::new(dispatcher_with(backend)), allow_mutating)
    }

    #[test]
    fn lists_tools_grouped_by_category() {
        let listing = tester(Arc::new(CountingBackend::default()), false).list_tools();

        assert!(listing.starts_with("authentication (1)\n  authenticator_rq\n"));
        assert!(listing.contains("basket (9)"));
        assert!(listing.contains("  basket_confirm_rq [mutating]"));
        assert!(listing.ends_with("51 tools\n"));
    }

    #[test]
    fn info_shows_operation_and_schema() {
        let info = tester(Arc::new(CountingBackend::default()), false)
            .tool_info("basket_summary_rq")
            .expect("info");

        assert!(info.contains("operation:   POST /BasketSummaryRQ"));
        assert!(info.contains("\"basket_id\""));
    }

    #[test]
    fn info_for_unknown_tool_is_an_error() {
        let error = tester(Arc::new(CountingBackend::default()), false)
            .tool_info("hotel_teleport_rq")
            .expect_err("unknown");
        assert!(matches!(error, HarnessError::Tool(_)));
    }

    #[tokio::test]
    async fn test_tool_generates_sample_arguments() {
        let backend = Arc::new(CountingBackend::default());
        let run = tester(backend.clone(), false)
            .test_tool("budget_search_rq", None)
            .await
            .expect("run");

        assert!(run.result.is_success());
        assert_eq!(run.exit_code(), EXIT_OK);
        assert_eq!(run.arguments["order_by"], "id");
        assert_eq!(run.arguments["order_type"], "asc");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tool_uses_supplied_arguments() {
        let run = tester(Arc::new(CountingBackend::default()), false)
            .test_tool("hotel_search_rq", Some(r#"{"page": 0}"#))
            .await
            .expect("run");

        assert_eq!(run.result.failure_kind(), Some(ErrorKind::Validation));
        assert_eq!(run.exit_code(), EXIT_PARTIAL);
        assert!(run.render().contains("validation: "));
    }

    #[tokio::test]
    async fn malformed_arguments_are_rejected() {
        let error = tester(Arc::new(CountingBackend::default()), false)
            .test_tool("hotel_search_rq", Some("{page"))
            .await
            .expect_err("bad json");
        assert!(matches!(error, HarnessError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn mutating_tools_need_explicit_permission() {
        let backend = Arc::new(CountingBackend::default());
        let refused = tester(backend.clone(), false)
            .test_tool("basket_delete_rq", Some(r#"{"basket_id": "B1"}"#))
            .await
            .expect_err("refused");
        assert!(matches!(refused, HarnessError::MutatingRefused(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

        let run = tester(backend.clone(), true)
            .test_tool("basket_delete_rq", Some(r#"{"basket_id": "B1"}"#))
            .await
            .expect("allowed");
        assert!(run.result.is_success());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn interactive_session_runs_commands_until_quit() {
        let backend = Arc::new(CountingBackend::default());
        let tester = tester(backend.clone(), false);
        let input = "list\ninfo zone_search_rq\ntest zone_search_rq {\"order_type\": \"desc\"}\nbogus\nquit\ntest zone_search_rq\n";
        let mut output = Vec::new();

        tester
            .interactive(input.as_bytes(), &mut output)
            .await
            .expect("session");

        let output = String::from_utf8(output).expect("utf8");
        assert!(output.contains("51 tools"));
        assert!(output.contains("operation:   POST /ZoneSearchRQ"));
        assert!(output.contains("zone_search_rq {\"order_type\":\"desc\"} -> success"));
        assert!(output.contains("unrecognized command 'bogus'"));
        // The command after quit never runs.
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }
}
