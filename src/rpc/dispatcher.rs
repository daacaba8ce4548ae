//! JSON-RPC call handling: parse → validate → resolve → invoke → respond.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use serde_json::{Map, Value};

use crate::binding::{bind_named, BindError};
use crate::convert::ConverterRegistry;
use crate::handler::{Args, Reply, RequestContext};
use crate::observability::metrics;
use crate::resilience::{run_with_retry, RetryPolicy};

use super::envelope::{
    RpcRequest, RpcResponse, INVALID_PARAMS, INVOCATION_ERROR, METHOD_NOT_FOUND,
};
use super::object::{RpcMethod, RpcObject};

/// Content type used to decode object parameters.
pub const APPLICATION_JSON: &str = "application/json";

/// What an RPC call writes back.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcReply {
    Response(RpcResponse),
    /// Notification: 200 with an empty body.
    Notification,
}

impl RpcReply {
    pub fn into_response(self) -> Response {
        match self {
            RpcReply::Notification => Response::new(Body::empty()),
            RpcReply::Response(envelope) => match serde_json::to_vec(&envelope) {
                Ok(bytes) => {
                    let mut response = Response::new(Body::from(bytes));
                    response.headers_mut().insert(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static(APPLICATION_JSON),
                    );
                    response
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode RPC response");
                    let mut response = Response::new(Body::empty());
                    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                    response
                }
            },
        }
    }
}

/// Handle one JSON-RPC request body addressed to `object`.
pub async fn dispatch_call(
    object: &RpcObject,
    body: &[u8],
    context: &Arc<RequestContext>,
    converters: &ConverterRegistry,
    retry: Option<&RetryPolicy>,
) -> RpcReply {
    let request = match RpcRequest::parse(body) {
        Ok(request) => request,
        Err(envelope) => {
            tracing::debug!(object = %object.name, id = %envelope.id, "Rejected RPC request");
            return respond(envelope);
        }
    };

    let RpcRequest { id, method, params } = request;
    let outcome = invoke(object, &method, &params, context, converters, retry).await;

    let Some(id) = id else {
        if let Err((code, message)) = &outcome {
            tracing::debug!(object = %object.name, method = %method, code, message = %message, "RPC notification failed");
        }
        return RpcReply::Notification;
    };

    respond(match outcome {
        Ok(result) => RpcResponse::result(id, result),
        Err((code, message)) => RpcResponse::error(id, code, message),
    })
}

fn respond(envelope: RpcResponse) -> RpcReply {
    if let Some(code) = envelope.error_code() {
        metrics::record_rpc_error(code);
    }
    RpcReply::Response(envelope)
}

async fn invoke(
    object: &RpcObject,
    method_name: &str,
    params: &Map<String, Value>,
    context: &Arc<RequestContext>,
    converters: &ConverterRegistry,
    retry: Option<&RetryPolicy>,
) -> Result<Value, (i64, String)> {
    let method = object
        .find(method_name)
        .ok_or_else(|| (METHOD_NOT_FOUND, format!("Method not found: {method_name}")))?;

    let args = bind_params(method, params, converters)
        .map_err(|e| (INVALID_PARAMS, format!("Invalid params: {e}")))?;

    tracing::debug!(
        request_id = ?context.request_id,
        object = %object.name,
        method = %method.name,
        "Invoking RPC method"
    );

    let route = format!("{}.{}", object.name, method.name);
    let outcome = run_with_retry(retry, &route, || method.handler.call(args.clone()))
        .await
        .map_err(|e| {
            tracing::warn!(method = %route, error = %e, "RPC method failed");
            (INVOCATION_ERROR, e.message().to_string())
        })?;

    let (reply, _hook) = outcome.into_parts();
    Ok(result_value(&reply))
}

/// Bind named JSON arguments by exact parameter name.
///
/// Values are reduced to the text form query parameters arrive in and take
/// the same conversion path.
fn bind_params(
    method: &RpcMethod,
    params: &Map<String, Value>,
    converters: &ConverterRegistry,
) -> Result<Args, BindError> {
    let mut args = Args::new();
    for spec in &method.params {
        let raw = params
            .get(&spec.name)
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) if !spec.ty.is_structured() => s.clone(),
                other => other.to_string(),
            });
        let value = bind_named(spec, raw.as_deref(), converters, APPLICATION_JSON)?;
        args.push(spec.name.clone(), value);
    }
    Ok(args)
}

/// Buffers become base64, documents pass through, collections and scalars
/// map onto JSON; anything else falls back to its text form.
pub fn result_value(reply: &Reply) -> Value {
    match reply.to_structure() {
        Ok(value) => value,
        Err(reason) => {
            tracing::debug!(kind = reply.kind(), reason = %reason, "RPC result has no structural form");
            match reply {
                Reply::Opaque(opaque) => Value::String(opaque.describe()),
                _ => Value::Null,
            }
        }
    }
}
