use std::collections::BTreeMap;
use std::sync::Arc;

use edgekit_core::functions::FunctionDeploy;
use edgekit_core::{FunctionStore, ImportMap, StoreError};
use edgekit_secrets::{SecretStore, SetAction};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

use crate::backend::{FunctionInvoker, InvokeError, InvokeRequest};
use crate::envelope;

pub const DEPLOY_FUNCTION: &str = "deploy_edge_function";
pub const LIST_FUNCTIONS: &str = "list_edge_functions";
pub const GET_FUNCTION: &str = "get_edge_function";
pub const DELETE_FUNCTION: &str = "delete_edge_function";
pub const SET_SECRET: &str = "set_edge_function_secret";
pub const DELETE_SECRET: &str = "delete_edge_function_secret";
pub const LIST_SECRETS: &str = "list_edge_function_secrets";
pub const INVOKE_FUNCTION: &str = "invoke_edge_function";

const RESTARTED_NOTE: &str = "Edge runtime restarted; functions now see the new secrets.";
const RESTART_FAILED_NOTE: &str = "Secret saved, but the edge runtime restart failed. Running \
                                   functions may still see stale secrets until the runtime is \
                                   restarted manually.";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

impl ToolError {
    /// Extra envelope fields for errors that carry structured detail.
    fn details(&self) -> Option<Value> {
        match self {
            ToolError::Invoke(InvokeError::Status { status, body }) => Some(json!({
                "status": status,
                "details": body,
            })),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployParams {
    name: String,
    source: String,
    #[serde(default)]
    import_map: Option<ImportMapArg>,
    #[serde(default, rename = "verifyJWT", alias = "verifyJwt", alias = "verify_jwt")]
    verify_jwt: Option<bool>,
}

/// Accepts either a bare alias map or the on-disk `{"imports": {...}}` shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportMapArg {
    Wrapped { imports: ImportMap },
    Flat(ImportMap),
}

impl From<ImportMapArg> for ImportMap {
    fn from(arg: ImportMapArg) -> Self {
        match arg {
            ImportMapArg::Wrapped { imports } => imports,
            ImportMapArg::Flat(imports) => imports,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NameParams {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SetSecretParams {
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct KeyParams {
    key: String,
}

#[derive(Debug, Deserialize)]
struct InvokeParams {
    name: String,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

/// The store facade behind every MCP tool.
///
/// Each operation returns the uniform envelope: `{"success": true, ...}` or
/// `{"success": false, "error": "..."}`. No error escapes [`dispatch`](Self::dispatch).
pub struct ToolHandlers {
    functions: FunctionStore,
    secrets: SecretStore,
    backend: Arc<dyn FunctionInvoker>,
}

impl ToolHandlers {
    pub fn new(
        functions: FunctionStore,
        secrets: SecretStore,
        backend: Arc<dyn FunctionInvoker>,
    ) -> Self {
        Self {
            functions,
            secrets,
            backend,
        }
    }

    pub async fn dispatch(&self, tool: &str, args: Value) -> Value {
        let result = match tool {
            DEPLOY_FUNCTION => self.deploy_function(args).await,
            LIST_FUNCTIONS => self.list_functions().await,
            GET_FUNCTION => self.get_function(args).await,
            DELETE_FUNCTION => self.delete_function(args).await,
            SET_SECRET => self.set_secret(args).await,
            DELETE_SECRET => self.delete_secret(args).await,
            LIST_SECRETS => self.list_secrets().await,
            INVOKE_FUNCTION => self.invoke_function(args).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        };

        match result {
            Ok(fields) => envelope::success(fields),
            Err(e) => {
                tracing::warn!(tool = %tool, error = %e, "Tool call failed");
                envelope::failure(&e.to_string(), e.details())
            }
        }
    }

    async fn deploy_function(&self, args: Value) -> Result<Value, ToolError> {
        let params: DeployParams = parse_args(args)?;
        let outcome = self
            .functions
            .deploy(FunctionDeploy {
                name: params.name,
                source: params.source,
                import_map: params.import_map.map(ImportMap::from),
                verify_jwt: params.verify_jwt,
            })
            .await?;
        Ok(serde_json::to_value(outcome)?)
    }

    async fn list_functions(&self) -> Result<Value, ToolError> {
        let functions = self.functions.list().await?;
        Ok(json!({ "functions": functions }))
    }

    async fn get_function(&self, args: Value) -> Result<Value, ToolError> {
        let params: NameParams = parse_args(args)?;
        let artifact = self.functions.get(&params.name).await?;
        Ok(serde_json::to_value(artifact)?)
    }

    async fn delete_function(&self, args: Value) -> Result<Value, ToolError> {
        let params: NameParams = parse_args(args)?;
        self.functions.delete(&params.name).await?;
        Ok(json!({ "message": format!("Function '{}' deleted", params.name) }))
    }

    async fn set_secret(&self, args: Value) -> Result<Value, ToolError> {
        let params: SetSecretParams = parse_args(args)?;
        let outcome = self.secrets.set(&params.key, &params.value).await?;
        Ok(json!({
            "key": params.key,
            "action": outcome.action,
            "created": outcome.action == SetAction::Created,
            "updated": outcome.action == SetAction::Updated,
            "restarted": outcome.restarted,
            "note": restart_note(outcome.restarted),
        }))
    }

    async fn delete_secret(&self, args: Value) -> Result<Value, ToolError> {
        let params: KeyParams = parse_args(args)?;
        let outcome = self.secrets.delete(&params.key).await?;
        Ok(json!({
            "key": params.key,
            "restarted": outcome.restarted,
            "note": restart_note(outcome.restarted),
        }))
    }

    async fn list_secrets(&self) -> Result<Value, ToolError> {
        let secrets = self.secrets.list().await?;
        Ok(json!({ "secrets": secrets }))
    }

    async fn invoke_function(&self, args: Value) -> Result<Value, ToolError> {
        let params: InvokeParams = parse_args(args)?;
        edgekit_core::functions::validate_function_name(&params.name)?;

        let request = InvokeRequest {
            name: params.name,
            payload: params.payload.unwrap_or_else(|| json!({})),
            headers: params.headers,
        };
        let response = self.backend.invoke(&request).await?;
        Ok(json!({
            "status": response.status,
            "result": response.body,
        }))
    }
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    Ok(serde_json::from_value(args)?)
}

fn restart_note(restarted: bool) -> &'static str {
    if restarted {
        RESTARTED_NOTE
    } else {
        RESTART_FAILED_NOTE
    }
}
