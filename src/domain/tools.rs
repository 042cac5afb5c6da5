//! Booking tools exposed via Model Context Protocol
//!
//! Tool descriptors come from the catalog registry. Calls are resolved and
//! executed by the dispatcher; this module only shapes MCP results.

use rust_mcp_sdk::schema::{CallToolRequestParams, CallToolResult, ContentBlock, TextContent, Tool};
use serde_json::{json, Map, Value};

use crate::catalog::{Registry, ToolDescriptor};
use crate::dispatcher::InvocationResult;
use crate::errors::{AppError, ErrorKind};
use crate::mcp::rpc::{
    json_rpc_error, json_rpc_error_with_data, json_rpc_serialized, INVALID_PARAMS,
    METHOD_NOT_FOUND,
};
use crate::AppState;

pub fn tool_definition(descriptor: &ToolDescriptor) -> Result<Tool, AppError> {
    serde_json::from_value(json!({
        "name": descriptor.name.as_str(),
        "description": descriptor.description,
        "inputSchema": descriptor.input_schema.to_input_schema(),
    }))
    .map_err(|err| {
        AppError::internal(format!(
            "tool {} has no valid MCP definition: {err}",
            descriptor.name
        ))
    })
}

pub fn build_tools_list(registry: &Registry) -> Result<Vec<Tool>, AppError> {
    registry.list_tools().iter().map(tool_definition).collect()
}

pub async fn handle_tools_call(state: &AppState, id: Option<Value>, params: Option<Value>) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    let arguments = Value::Object(tool_call.arguments.unwrap_or_default());
    let result = state.dispatcher.call(&tool_call.name, arguments).await;

    if result.failure_kind() == Some(ErrorKind::UnknownTool) {
        return json_rpc_error_with_data(
            id,
            METHOD_NOT_FOUND,
            "Method not found",
            Some(json!({
                "code": "tool_not_found",
                "message": "unknown tool name",
                "details": {
                    "name": tool_call.name,
                },
            })),
        );
    }

    let category = state
        .dispatcher
        .registry()
        .get(&tool_call.name)
        .ok()
        .map(|descriptor| descriptor.category);

    json_rpc_serialized(id, &call_tool_result(&tool_call.name, category, result))
}

fn call_tool_result(
    tool: &str,
    category: Option<crate::catalog::Category>,
    result: InvocationResult,
) -> CallToolResult {
    match result {
        InvocationResult::Success {
            payload,
            elapsed_ms,
        } => {
            let text = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
            CallToolResult {
                content: vec![ContentBlock::from(TextContent::new(text, None, None))],
                is_error: None,
                meta: None,
                structured_content: Some(Map::from_iter([
                    ("tool".to_string(), json!(tool)),
                    ("category".to_string(), json!(category)),
                    ("elapsed_ms".to_string(), json!(elapsed_ms)),
                    ("data".to_string(), payload),
                ])),
            }
        }
        InvocationResult::Failure {
            kind,
            message,
            elapsed_ms,
        } => CallToolResult {
            content: vec![ContentBlock::from(TextContent::new(
                format!("{kind}: {message}"),
                None,
                None,
            ))],
            is_error: Some(true),
            meta: None,
            structured_content: Some(Map::from_iter([
                ("tool".to_string(), json!(tool)),
                ("elapsed_ms".to_string(), json!(elapsed_ms)),
                (
                    "error".to_string(),
                    json!({
                        "kind": kind,
                        "message": message,
                    }),
                ),
            ])),
        },
    }
}
