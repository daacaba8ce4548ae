//! Per-request data visible to handlers.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};

use crate::security::Principal;

/// Request metadata bound to `Context` parameters and passed to templates.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub principal: Option<Principal>,
    pub request_id: Option<String>,
}

/// An uploaded multipart file.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}
