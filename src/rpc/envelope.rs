//! JSON-RPC 2.0 wire structures.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";

pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INVOCATION_ERROR: i64 = -32000;

/// A validated call.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    /// `None` marks a notification.
    pub id: Option<Value>,
    pub method: String,
    pub params: Map<String, Value>,
}

impl RpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Parse and validate a request body.
    ///
    /// Failures here always produce a response; the id falls back to `""`
    /// when it cannot be recovered.
    pub fn parse(body: &[u8]) -> Result<Self, RpcResponse> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            RpcResponse::error(Value::from(""), INVALID_REQUEST, format!("Invalid Request: {e}"))
        })?;
        let Value::Object(mut object) = value else {
            return Err(RpcResponse::error(
                Value::from(""),
                INVALID_REQUEST,
                "Invalid Request: expected a JSON object",
            ));
        };

        let id = match object.remove("id") {
            None | Some(Value::Null) => None,
            Some(id) => Some(id),
        };
        let reply_id = id.clone().unwrap_or_else(|| Value::from(""));

        match object.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            _ => {
                return Err(RpcResponse::error(
                    reply_id,
                    INVALID_REQUEST,
                    "Invalid Request: jsonrpc must be \"2.0\"",
                ))
            }
        }

        let method = match object.remove("method") {
            Some(Value::String(method)) if !method.is_empty() => method,
            _ => {
                return Err(RpcResponse::error(
                    reply_id,
                    INVALID_REQUEST,
                    "Invalid Request: method must be a non-empty string",
                ))
            }
        };

        let params = match object.remove("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(params)) => params,
            Some(Value::Array(_)) => {
                return Err(RpcResponse::error(
                    reply_id,
                    INVALID_PARAMS,
                    "sequential parameters not supported",
                ))
            }
            Some(_) => {
                return Err(RpcResponse::error(
                    reply_id,
                    INVALID_PARAMS,
                    "params must be an object",
                ))
            }
        };

        Ok(Self { id, method, params })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RpcPayload {
    Result(Value),
    Error(RpcError),
}

/// Response envelope. Exactly one of `result` / `error` is serialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(flatten)]
    pub payload: RpcPayload,
}

impl RpcResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: RpcPayload::Result(result),
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: RpcPayload::Error(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn error_code(&self) -> Option<i64> {
        match &self.payload {
            RpcPayload::Error(e) => Some(e.code),
            RpcPayload::Result(_) => None,
        }
    }
}
