//! Inbound request extraction.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Buffer the body within the configured limit
//! - Decode query strings, urlencoded forms and multipart uploads
//! - Carry the authenticated principal into the engine
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Oversized bodies are rejected before any routing work
//! - The engine sees a transport-free [`InboundRequest`]

use std::collections::BTreeSet;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request};
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::error::DispatchError;
use crate::handler::{RequestContext, UploadedFile};
use crate::routing::normalize_path;
use crate::security::Principal;

pub const X_REQUEST_ID: &str = "x-request-id";

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART_FORM: &str = "multipart/form-data";

/// Generates `x-request-id` values.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// A fully buffered request, ready for dispatch.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Normalized path.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub uploads: Vec<UploadedFile>,
    pub principal: Option<Principal>,
    pub request_id: Option<String>,
}

impl InboundRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: normalize_path(path),
            query: Vec::new(),
            form: Vec::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            uploads: Vec::new(),
            principal: None,
            request_id: None,
        }
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_form(mut self, name: &str, value: &str) -> Self {
        self.form.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_body(self, content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut request = self.with_header(header::CONTENT_TYPE, content_type);
        request.body = body.into();
        request
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Case-insensitive lookup, query string first, then form fields.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .chain(self.form.iter())
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Lowercased names of every supplied query and form parameter.
    pub fn supplied_names(&self) -> BTreeSet<String> {
        self.query
            .iter()
            .chain(self.form.iter())
            .map(|(key, _)| key.to_lowercase())
            .collect()
    }

    /// Media type of the body, without parameters.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(crate::render::mime::essence)
            .filter(|ct| !ct.is_empty())
    }

    pub fn context(&self) -> RequestContext {
        RequestContext {
            method: self.method.clone(),
            path: self.path.clone(),
            headers: self.headers.clone(),
            principal: self.principal.clone(),
            request_id: self.request_id.clone(),
        }
    }

    /// Buffer and decode an axum request.
    pub async fn from_http(request: Request<Body>, max_body_bytes: usize) -> Result<Self, DispatchError> {
        let declared_length = request
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared_length.is_some_and(|len| len > max_body_bytes) {
            return Err(DispatchError::PayloadTooLarge {
                limit: max_body_bytes,
            });
        }

        let (mut parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, max_body_bytes)
            .await
            .map_err(|_| DispatchError::PayloadTooLarge {
                limit: max_body_bytes,
            })?;

        let mut inbound = Self::new(parts.method.clone(), parts.uri.path());
        inbound.query = parts
            .uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        inbound.principal = parts.extensions.remove::<Principal>();
        inbound.request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        inbound.headers = parts.headers.clone();

        let content_type = inbound.content_type().map(str::to_ascii_lowercase);
        match content_type.as_deref() {
            Some(FORM_URLENCODED) => {
                inbound.form = url::form_urlencoded::parse(&body).into_owned().collect();
            }
            Some(MULTIPART_FORM) => {
                let request = Request::from_parts(parts, Body::from(body.clone()));
                inbound.read_multipart(request).await?;
            }
            _ => {}
        }

        inbound.body = body;
        Ok(inbound)
    }

    /// File fields become uploads, plain fields become form parameters.
    async fn read_multipart(&mut self, request: Request<Body>) -> Result<(), DispatchError> {
        let bad_request = |e: &dyn std::fmt::Display| DispatchError::BadRequest(e.to_string());
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| bad_request(&e))?;

        while let Some(field) = multipart.next_field().await.map_err(|e| bad_request(&e))? {
            let field_name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(|e| bad_request(&e))?;

            if file_name.is_some() {
                self.uploads.push(UploadedFile {
                    field_name,
                    file_name,
                    content_type,
                    data,
                });
            } else {
                self.form
                    .push((field_name, String::from_utf8_lossy(&data).into_owned()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, content_type: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_query_and_form() {
        let inbound = InboundRequest::from_http(
            request(
                "/concatenate//?str1=Hello%20&Str2=World",
                Some("application/x-www-form-urlencoded; charset=utf-8"),
                "str3=%21",
            ),
            1024,
        )
        .await
        .unwrap();

        assert_eq!(inbound.path, "/concatenate");
        assert_eq!(inbound.parameter("STR1"), Some("Hello "));
        assert_eq!(inbound.parameter("str2"), Some("World"));
        assert_eq!(inbound.parameter("str3"), Some("!"));
        let names: Vec<String> = inbound.supplied_names().into_iter().collect();
        assert_eq!(names, vec!["str1", "str2", "str3"]);
    }

    #[tokio::test]
    async fn test_media_type_is_case_insensitive() {
        let inbound = InboundRequest::from_http(
            request("/submit", Some("Application/X-WWW-Form-Urlencoded"), "name=ann"),
            1024,
        )
        .await
        .unwrap();
        assert_eq!(inbound.parameter("name"), Some("ann"));

        let body = "--b\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"x.bin\"\r\n\r\n\
            data\r\n\
            --b--\r\n";
        let inbound = InboundRequest::from_http(
            request("/upload", Some("Multipart/Form-Data; boundary=b"), body),
            1024,
        )
        .await
        .unwrap();
        assert_eq!(inbound.uploads.len(), 1);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let err = InboundRequest::from_http(request("/upload", None, "0123456789"), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::PayloadTooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn test_multipart() {
        let body = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"title\"\r\n\r\n\
            notes\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            hello\r\n\
            --XyZ--\r\n";
        let inbound = InboundRequest::from_http(
            request("/upload", Some("multipart/form-data; boundary=XyZ"), body),
            4096,
        )
        .await
        .unwrap();

        assert_eq!(inbound.parameter("title"), Some("notes"));
        assert_eq!(inbound.uploads.len(), 1);
        assert_eq!(inbound.uploads[0].file_name.as_deref(), Some("a.txt"));
        assert_eq!(&inbound.uploads[0].data[..], b"hello");
    }
}
