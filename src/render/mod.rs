//! Result rendering.
//!
//! # Responsibilities
//! - Turn a handler [`Outcome`] into an HTTP response
//! - Run result hooks before default rendering
//! - Stream files, encode documents, apply redirects and null policies
//!
//! # Design Decisions
//! - One rendering arm per [`Reply`] variant
//! - A content type set by a hook is never overridden
//! - The route's declared type labels text, scalars and `To` converter output;
//!   objects without a converter fall back to JSON
//! - Failures are logged and become a generic 500 (404 for missing files);
//!   nothing escapes this module

pub mod mime;
pub mod template;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

use crate::convert::{ConvertError, ConverterRegistry};
use crate::handler::{
    FileRef, HookFlow, Opaque, Outcome, Reply, RequestContext, ResponseDraft, REDIRECT_PREFIX,
};
use crate::routing::{RenderSpec, ServeSpec};

pub use template::{PlaceholderTemplates, TemplateEngine};

const APPLICATION_JSON: &str = "application/json";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {kind} result: {reason}")]
    Encode { kind: &'static str, reason: String },

    #[error(transparent)]
    Conversion(#[from] ConvertError),

    #[error("template {name} failed: {reason}")]
    Template { name: String, reason: String },

    #[error("invalid redirect location `{0}`")]
    InvalidRedirect(String),

    #[error("result hook panicked")]
    HookPanicked,
}

impl RenderError {
    pub fn status(&self) -> StatusCode {
        match self {
            RenderError::FileNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Renders handler outcomes. Immutable and shared by all requests.
#[derive(Clone)]
pub struct Renderer {
    converters: Arc<ConverterRegistry>,
    templates: Option<Arc<dyn TemplateEngine>>,
    template_types: Vec<String>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("templates", &self.templates.is_some())
            .field("template_types", &self.template_types)
            .finish()
    }
}

impl Renderer {
    pub fn new(
        converters: Arc<ConverterRegistry>,
        templates: Option<Arc<dyn TemplateEngine>>,
        template_types: Vec<String>,
    ) -> Self {
        Self {
            converters,
            templates,
            template_types,
        }
    }

    /// Render `outcome` for a route. Always yields a response.
    pub async fn render(
        &self,
        spec: &RenderSpec,
        outcome: Outcome,
        context: &RequestContext,
    ) -> Response {
        let (reply, hook) = outcome.into_parts();
        let mut draft = ResponseDraft::new();

        if let Some(hook) = hook {
            match catch_unwind(AssertUnwindSafe(|| hook(&mut draft))) {
                Ok(HookFlow::Finished) => return draft.into_response(),
                Ok(HookFlow::Continue) => {}
                Err(_) => return failure(RenderError::HookPanicked, context),
            }
        }

        let kind = reply.kind();
        match self.render_reply(spec, reply, &mut draft, context).await {
            Ok(()) => draft.into_response(),
            Err(e) => {
                tracing::debug!(kind, "Rendering failed");
                failure(e, context)
            }
        }
    }

    async fn render_reply(
        &self,
        spec: &RenderSpec,
        reply: Reply,
        draft: &mut ResponseDraft,
        context: &RequestContext,
    ) -> Result<(), RenderError> {
        match reply {
            Reply::File(file) => stream_attachment(&file, draft).await,
            Reply::Buffer(bytes) => {
                default_content_type(draft, mime::OCTET_STREAM);
                draft.set_body(bytes);
                Ok(())
            }
            Reply::Document(value) => write_json(draft, "document", &value),
            reply @ (Reply::Mapping(_) | Reply::Sequence(_)) => {
                let value = reply.to_structure().map_err(|reason| RenderError::Encode {
                    kind: reply.kind(),
                    reason,
                })?;
                write_json(draft, reply.kind(), &value)
            }
            Reply::Scalar(scalar) => {
                default_content_type(draft, spec.produces.as_deref().unwrap_or(TEXT_PLAIN));
                draft.set_body(scalar.to_string());
                Ok(())
            }
            Reply::Text(text) => self.render_text(spec, text, draft, context).await,
            Reply::Null => {
                if let Some(null) = &spec.null_result {
                    draft.status = null.status;
                    if !null.body.is_empty() {
                        default_content_type(draft, TEXT_PLAIN);
                        draft.set_body(null.body.clone());
                    }
                }
                Ok(())
            }
            Reply::Opaque(opaque) => self.render_opaque(spec, &opaque, draft),
        }
    }

    async fn render_text(
        &self,
        spec: &RenderSpec,
        text: String,
        draft: &mut ResponseDraft,
        context: &RequestContext,
    ) -> Result<(), RenderError> {
        if let Some(location) = text.strip_prefix(REDIRECT_PREFIX) {
            let value = HeaderValue::from_str(location)
                .map_err(|_| RenderError::InvalidRedirect(location.to_string()))?;
            draft.status = StatusCode::FOUND;
            draft.headers.insert(header::LOCATION, value);
            return Ok(());
        }

        if let Some(serve) = &spec.serve {
            return self.serve_file(serve, &text, draft, context).await;
        }

        default_content_type(draft, spec.produces.as_deref().unwrap_or(TEXT_HTML));
        draft.set_body(text);
        Ok(())
    }

    fn render_opaque(
        &self,
        spec: &RenderSpec,
        opaque: &Opaque,
        draft: &mut ResponseDraft,
    ) -> Result<(), RenderError> {
        if let Some(produces) = &spec.produces {
            let converted = self
                .converters
                .convert_to(produces, opaque.type_key(), opaque.value());
            if let Some(result) = converted {
                let bytes = result?;
                default_content_type(draft, produces);
                draft.set_body(bytes);
                return Ok(());
            }
        }

        match opaque.to_structure() {
            Ok(value) => write_json(draft, "opaque", &value),
            Err(_) => {
                default_content_type(draft, TEXT_PLAIN);
                draft.set_body(opaque.describe());
                Ok(())
            }
        }
    }

    /// Serve `relative` from the route's folder, templating textual files
    /// when enabled.
    async fn serve_file(
        &self,
        serve: &ServeSpec,
        relative: &str,
        draft: &mut ResponseDraft,
        context: &RequestContext,
    ) -> Result<(), RenderError> {
        let path = resolve_under(&serve.root, relative)
            .ok_or_else(|| RenderError::FileNotFound(PathBuf::from(relative)))?;
        let mime_type = mime::from_path(&path);

        let templates = self
            .templates
            .as_ref()
            .filter(|_| serve.template && self.is_template_type(mime_type));

        match templates {
            Some(engine) => {
                let mut source = String::new();
                open(&path)
                    .await?
                    .read_to_string(&mut source)
                    .await
                    .map_err(|e| io_error(&path, e))?;
                let name = relative.trim_start_matches('/');
                let rendered = engine
                    .render(name, &source, context)
                    .map_err(|reason| RenderError::Template {
                        name: name.to_string(),
                        reason,
                    })?;
                default_content_type(draft, &with_charset(mime_type));
                draft.set_body(rendered);
                Ok(())
            }
            None => {
                let file = open(&path).await?;
                let content_type = if mime::is_text(mime_type) {
                    with_charset(mime_type)
                } else {
                    mime_type.to_string()
                };
                default_content_type(draft, &content_type);
                draft.set_body(Body::from_stream(ReaderStream::new(file)));
                Ok(())
            }
        }
    }

    fn is_template_type(&self, mime_type: &str) -> bool {
        let essence = mime::essence(mime_type);
        essence == "text/html"
            || self
                .template_types
                .iter()
                .any(|t| mime::essence(t).eq_ignore_ascii_case(essence))
    }
}

async fn stream_attachment(file: &FileRef, draft: &mut ResponseDraft) -> Result<(), RenderError> {
    let handle = open(&file.path).await?;
    let length = handle
        .metadata()
        .await
        .map_err(|e| io_error(&file.path, e))?
        .len();

    default_content_type(draft, mime::from_path(Path::new(&file.file_name())));
    draft.set_header(
        header::CONTENT_DISPOSITION,
        &format!("attachment; filename=\"{}\"", file.file_name().replace('"', "")),
    );
    draft.set_header(header::CONTENT_LENGTH, &length.to_string());
    draft.set_body(Body::from_stream(ReaderStream::new(handle)));
    Ok(())
}

async fn open(path: &Path) -> Result<tokio::fs::File, RenderError> {
    match tokio::fs::File::open(path).await {
        Ok(file) => {
            let is_file = file
                .metadata()
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if is_file {
                Ok(file)
            } else {
                Err(RenderError::FileNotFound(path.to_path_buf()))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RenderError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => Err(io_error(path, e)),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Join `relative` onto `root`, refusing anything that climbs out of it.
/// An empty path or a trailing slash selects `index.html`.
fn resolve_under(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(relative.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if relative.is_empty() || relative.ends_with('/') {
        path.push("index.html");
    }
    Some(path)
}

fn with_charset(mime_type: &str) -> String {
    format!("{mime_type}; charset=utf-8")
}

fn default_content_type(draft: &mut ResponseDraft, content_type: &str) {
    if draft.content_type().is_none() {
        draft.set_content_type(content_type);
    }
}

fn write_json(
    draft: &mut ResponseDraft,
    kind: &'static str,
    value: &serde_json::Value,
) -> Result<(), RenderError> {
    let bytes = serde_json::to_vec(value).map_err(|e| RenderError::Encode {
        kind,
        reason: e.to_string(),
    })?;
    default_content_type(draft, APPLICATION_JSON);
    draft.set_body(bytes);
    Ok(())
}

fn failure(error: RenderError, context: &RequestContext) -> Response {
    let status = error.status();
    if status.is_server_error() {
        tracing::error!(
            request_id = ?context.request_id,
            path = %context.path,
            error = %error,
            "Failed to render result"
        );
    } else {
        tracing::debug!(path = %context.path, error = %error, "Result rendered as error");
    }
    let mut response = Response::new(Body::from(
        status.canonical_reason().unwrap_or("Error").to_string(),
    ));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Method;
    use serde::Serialize;

    use crate::routing::NullResult;

    fn context() -> RequestContext {
        RequestContext {
            method: Method::GET,
            path: "/test".into(),
            headers: Default::default(),
            principal: None,
            request_id: None,
        }
    }

    fn renderer() -> Renderer {
        Renderer::new(
            Arc::new(ConverterRegistry::builder().build()),
            Some(Arc::new(PlaceholderTemplates)),
            vec!["text/html".into()],
        )
    }

    async fn render(spec: &RenderSpec, outcome: impl Into<Outcome>) -> (StatusCode, Option<String>, String) {
        let response = renderer().render(spec, outcome.into(), &context()).await;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8_lossy(&body).into_owned())
    }

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("render-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_text_defaults_to_html() {
        let (status, ct, body) = render(&RenderSpec::default(), "Hello World").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ct.as_deref(), Some(TEXT_HTML));
        assert_eq!(body, "Hello World");

        let spec = RenderSpec {
            produces: Some("text/plain".into()),
            ..Default::default()
        };
        let (_, ct, _) = render(&spec, "plain").await;
        assert_eq!(ct.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_redirect() {
        let response = renderer()
            .render(&RenderSpec::default(), Outcome::redirect("/login"), &context())
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn test_json_shapes_and_scalars() {
        #[derive(Debug, Serialize)]
        struct User {
            name: &'static str,
        }

        let (_, ct, body) = render(&RenderSpec::default(), vec![1, 2, 3]).await;
        assert_eq!(ct.as_deref(), Some(APPLICATION_JSON));
        assert_eq!(body, "[1,2,3]");

        let (_, _, body) = render(&RenderSpec::default(), Reply::object(User { name: "ann" })).await;
        assert_eq!(body, r#"{"name":"ann"}"#);

        let (_, ct, body) = render(&RenderSpec::default(), 42i64).await;
        assert_eq!(ct.as_deref(), Some(TEXT_PLAIN));
        assert_eq!(body, "42");

        let (_, ct, _) = render(&RenderSpec::default(), Reply::buffer(&b"\x00"[..])).await;
        assert_eq!(ct.as_deref(), Some(mime::OCTET_STREAM));
    }

    #[tokio::test]
    async fn test_null_policy() {
        let (status, _, body) = render(&RenderSpec::default(), ()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());

        let spec = RenderSpec {
            null_result: Some(NullResult {
                status: StatusCode::NOT_FOUND,
                body: "nothing here".into(),
            }),
            ..Default::default()
        };
        let (status, _, body) = render(&spec, None::<String>).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "nothing here");
    }

    #[tokio::test]
    async fn test_hooks() {
        let finished = Outcome::new("ignored").with_hook(|draft| {
            draft.status = StatusCode::ACCEPTED;
            draft.set_body("from hook");
            HookFlow::Finished
        });
        let (status, _, body) = render(&RenderSpec::default(), finished).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, "from hook");

        let continued = Outcome::new("<b>x</b>").with_hook(|draft| {
            draft.status = StatusCode::CREATED;
            draft.set_content_type("text/xml");
            HookFlow::Continue
        });
        let (status, ct, body) = render(&RenderSpec::default(), continued).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(ct.as_deref(), Some("text/xml"));
        assert_eq!(body, "<b>x</b>");

        let panicking = Outcome::new("x").with_hook(|_draft| panic!("hook failure"));
        let (status, _, _) = render(&RenderSpec::default(), panicking).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_file_attachment() {
        let dir = scratch_dir();
        let path = dir.join("report.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let response = renderer()
            .render(&RenderSpec::default(), FileRef::new(&path).into(), &context())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"report.csv\""
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"a,b\n1,2\n");

        let (status, _, _) = render(&RenderSpec::default(), FileRef::new(dir.join("missing.bin"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_from_folder() {
        let dir = scratch_dir();
        std::fs::write(dir.join("index.html"), "<p>{{request.path}}</p>").unwrap();
        std::fs::write(dir.join("style.css"), "body{}").unwrap();

        let spec = RenderSpec {
            serve: Some(ServeSpec {
                root: dir.clone(),
                template: true,
            }),
            ..Default::default()
        };

        let (_, ct, body) = render(&spec, "/").await;
        assert_eq!(ct.as_deref(), Some("text/html; charset=utf-8"));
        assert_eq!(body, "<p>/test</p>");

        let (_, ct, body) = render(&spec, "style.css").await;
        assert_eq!(ct.as_deref(), Some("text/css; charset=utf-8"));
        assert_eq!(body, "body{}");

        let (status, _, _) = render(&spec, "../etc/passwd").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = render(&spec, "missing.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_opaque_through_converter() {
        #[derive(Debug)]
        struct Point(i32, i32);

        let mut builder = ConverterRegistry::builder();
        builder
            .register_to("point_csv", "text/csv", |p: &Point| {
                Ok::<_, String>(format!("{},{}", p.0, p.1).into_bytes())
            })
            .unwrap();
        let renderer = Renderer::new(Arc::new(builder.build()), None, vec![]);
        let spec = RenderSpec {
            produces: Some("text/csv".into()),
            ..Default::default()
        };

        let outcome = Outcome::new(Opaque::unstructured(Point(3, 4)));
        let response = renderer.render(&spec, outcome, &context()).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"3,4");

        let (_, ct, body) = render(&RenderSpec::default(), Opaque::unstructured(Point(1, 2))).await;
        assert_eq!(ct.as_deref(), Some(TEXT_PLAIN));
        assert_eq!(body, "Point(1, 2)");
    }

    #[tokio::test]
    async fn test_produces_without_converter_falls_back_to_json() {
        #[derive(Debug, Serialize)]
        struct P {
            x: i32,
        }

        let spec = RenderSpec {
            produces: Some("text/csv".into()),
            ..Default::default()
        };
        let (status, ct, body) = render(&spec, Reply::object(P { x: 1 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ct.as_deref(), Some(APPLICATION_JSON));
        assert_eq!(body, r#"{"x":1}"#);

        let (_, ct, body) = render(&spec, 7i64).await;
        assert_eq!(ct.as_deref(), Some("text/csv"));
        assert_eq!(body, "7");
    }

    #[test]
    fn test_resolve_under_refuses_traversal() {
        let root = Path::new("/srv/site");
        assert_eq!(resolve_under(root, "a/b.html"), Some(root.join("a/b.html")));
        assert_eq!(resolve_under(root, "/docs/"), Some(root.join("docs/index.html")));
        assert_eq!(resolve_under(root, "a/../../x"), None);
    }
}
