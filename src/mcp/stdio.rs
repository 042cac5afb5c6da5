//! Newline-delimited JSON-RPC over stdin/stdout
//!
//! Each input line is one request, notification or batch. Responses are written
//! as single lines. Logs go to stderr so stdout stays a clean protocol stream.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::mcp::server::handle_json_rpc_text;
use crate::AppState;

pub async fn serve_stdio(state: AppState) -> std::io::Result<()> {
    info!("mcp server listening on stdio");
    serve_lines(&state, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

pub async fn serve_lines<R, W>(state: &AppState, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(response) = handle_json_rpc_text(state, line).await else {
            continue;
        };

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
    }

    debug!("stdin closed, stopping stdio transport");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use super::*;
    use crate::dispatcher::tests::{dispatcher_with, CountingBackend};

    async fn run(input: &str) -> Vec<Value> {
        let state = AppState::new(
            Arc::new(dispatcher_with(Arc::new(CountingBackend::default()))),
            None,
        );
        let mut output = Vec::new();
        serve_lines(&state, input.as_bytes(), &mut output)
            .await
            .expect("serve");

        String::from_utf8(output)
            .expect("utf8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    #[tokio::test]
    async fn answers_each_request_on_its_own_line() {
        let responses = run(concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","clientInfo":{"name":"desktop","version":"1.0.0"},"capabilities":{}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        ))
        .await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "neobookings-mcp");
        assert_eq!(
            responses[1]["result"]["tools"]
                .as_array()
                .expect("tools")
                .len(),
            51
        );
    }

    #[tokio::test]
    async fn malformed_line_yields_parse_error_and_loop_continues() {
        let responses = run("{not json\n{\"jsonrpc\":\"2.0\",\"id\":9,\"method\":\"ping\"}\n").await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert_eq!(responses[1]["id"], 9);
        assert!(responses[1]["result"].is_object());
    }

    #[tokio::test]
    async fn batches_are_answered_as_arrays() {
        let responses = run(concat!(
            r#"[{"jsonrpc":"2.0","id":1,"method":"ping"},{"jsonrpc":"2.0","id":2,"method":"prompts/list"}]"#,
            "\n"
        ))
        .await;

        let batch = responses[0].as_array().expect("batch");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1]["result"]["prompts"], serde_json::json!([]));
    }
}
