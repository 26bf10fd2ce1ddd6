use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        CallToolRequestParams, CallToolResult, Content, ListToolsResult, PaginatedRequestParams,
        ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
};
use serde_json::{Value, json};

use crate::envelope;
use crate::handlers::{
    DELETE_FUNCTION, DELETE_SECRET, DEPLOY_FUNCTION, GET_FUNCTION, INVOKE_FUNCTION,
    LIST_FUNCTIONS, LIST_SECRETS, SET_SECRET, ToolHandlers,
};

/// MCP server exposing the edge function and secret stores as tools.
pub struct EdgekitServer {
    handlers: Arc<ToolHandlers>,
}

impl EdgekitServer {
    pub fn new(handlers: Arc<ToolHandlers>) -> Self {
        Self { handlers }
    }
}

fn tool(name: &'static str, description: &'static str, schema: Value) -> Tool {
    Tool {
        name: name.into(),
        title: None,
        description: Some(description.into()),
        input_schema: schema.as_object().cloned().unwrap_or_default().into(),
        output_schema: None,
        annotations: None,
        execution: None,
        icons: None,
        meta: None,
    }
}

fn no_arguments() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// Descriptors for every tool the server handles.
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        tool(
            DEPLOY_FUNCTION,
            "Deploy (create or overwrite) an edge function. The runtime picks up \
             the new source automatically.",
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Function name (letters, digits, '-' and '_')"
                    },
                    "source": {
                        "type": "string",
                        "description": "Function source code (the index file)"
                    },
                    "importMap": {
                        "type": "object",
                        "description": "Optional import map: alias -> URL",
                        "additionalProperties": { "type": "string" }
                    },
                    "verifyJWT": {
                        "type": "boolean",
                        "description": "Whether callers must present a valid JWT (default true)"
                    }
                },
                "required": ["name", "source"]
            }),
        ),
        tool(
            LIST_FUNCTIONS,
            "List deployed edge functions.",
            no_arguments(),
        ),
        tool(
            GET_FUNCTION,
            "Read the source and import map of a deployed edge function.",
            json!({
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"]
            }),
        ),
        tool(
            DELETE_FUNCTION,
            "Delete an edge function and all of its files.",
            json!({
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"]
            }),
        ),
        tool(
            SET_SECRET,
            "Create or update a secret shared by all edge functions. Restarts the \
             edge runtime so the change takes effect.",
            json!({
                "type": "object",
                "properties": {
                    "key": {
                        "type": "string",
                        "description": "Environment variable name ([A-Za-z_][A-Za-z0-9_]*)"
                    },
                    "value": { "type": "string" }
                },
                "required": ["key", "value"]
            }),
        ),
        tool(
            DELETE_SECRET,
            "Delete a secret. Restarts the edge runtime so the change takes effect.",
            json!({
                "type": "object",
                "properties": { "key": { "type": "string" } },
                "required": ["key"]
            }),
        ),
        tool(
            LIST_SECRETS,
            "List secret names with masked values.",
            no_arguments(),
        ),
        tool(
            INVOKE_FUNCTION,
            "Invoke a deployed edge function with a JSON payload.",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "payload": { "description": "JSON request body (default {})" },
                    "headers": {
                        "type": "object",
                        "description": "Extra request headers",
                        "additionalProperties": { "type": "string" }
                    }
                },
                "required": ["name"]
            }),
        ),
    ]
}

fn make_tool_result(content: Vec<Content>, is_error: bool) -> CallToolResult {
    CallToolResult {
        content,
        structured_content: None,
        is_error: Some(is_error),
        meta: None,
    }
}

impl ServerHandler for EdgekitServer {
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(tool_definitions()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool_name = request.name.to_string();
        let args = Value::Object(request.arguments.unwrap_or_default());

        tracing::info!(tool = %tool_name, "Handling tool call");

        // Run in its own task so a panic in a handler becomes an error
        // envelope instead of tearing down the session.
        let handlers = self.handlers.clone();
        let name = tool_name.clone();
        let result = match tokio::spawn(async move { handlers.dispatch(&name, args).await }).await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(tool = %tool_name, error = %e, "Tool handler aborted");
                envelope::failure(&format!("internal error while running {tool_name}: {e}"), None)
            }
        };

        let is_error = !envelope::is_success(&result);
        let text = serde_json::to_string_pretty(&result)
            .map_err(|e| McpError::internal_error(format!("Failed to encode result: {e}"), None))?;
        Ok(make_tool_result(vec![Content::text(text)], is_error))
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: rmcp::model::Implementation::from_build_env(),
            instructions: Some(
                "edgekit -- deploy edge functions, manage their shared secrets, and invoke them"
                    .into(),
            ),
        }
    }
}
