//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::to_bytes;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use serde::Serialize;

use switchyard::convert::{ConverterRegistryBuilder, RegistryError};
use switchyard::handler::{FileRef, HookFlow, Outcome, Reply};
use switchyard::routing::{PatternError, Route, RouteDescriptor};
use switchyard::rpc::RpcObject;
use switchyard::{Args, Engine, HandlerError, InboundRequest, Module, ParamType, RetryPolicy};

/// Decoded response parts.
pub struct Captured {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Captured {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

pub async fn read(response: Response) -> Captured {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    Captured {
        status,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

pub async fn send(engine: &Engine, request: InboundRequest) -> Captured {
    read(engine.dispatch(request).await).await
}

/// Fresh directory under the system temp dir.
pub fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("switchyard-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Temperature {
    pub celsius: f64,
}

/// Routes exercising every result shape and binding source.
pub struct Fixtures {
    pub attempts: Arc<AtomicU32>,
    pub files: PathBuf,
}

impl Fixtures {
    pub fn new() -> Self {
        let files = temp_dir();
        std::fs::write(files.join("index.html"), "<p>{{request.path}}</p>").unwrap();
        std::fs::write(files.join("data.txt"), "plain {{request.path}}").unwrap();
        Self {
            attempts: Arc::new(AtomicU32::new(0)),
            files,
        }
    }
}

impl Module for Fixtures {
    fn name(&self) -> &str {
        "fixtures"
    }

    fn routes(&self) -> Result<Vec<RouteDescriptor>, PatternError> {
        let attempts = Arc::clone(&self.attempts);
        let report = self.files.join("data.txt");
        Ok(vec![
            Route::get("/concatenate")
                .query("str1", ParamType::Str)
                .query("str2", ParamType::Str)
                .optional("str3", ParamType::Str, Some(""))
                .handler(|args: Args| async move {
                    Ok::<_, HandlerError>(format!(
                        "{}{}{}",
                        args.str("str1")?,
                        args.str("str2")?,
                        args.str("str3")?
                    ))
                })?,
            Route::get("/user")
                .named("user_by_id")
                .query("id", ParamType::Long)
                .handler(|args: Args| async move {
                    Ok::<_, HandlerError>(format!("id {}", args.i64("id")?))
                })?,
            Route::get("/user")
                .named("user_by_name")
                .query("name", ParamType::Str)
                .handler(|args: Args| async move {
                    Ok::<_, HandlerError>(format!("name {}", args.str("name")?))
                })?,
            Route::get("/reports")
                .roles(["auditor"])
                .handler(|_args: Args| async move { Ok::<_, HandlerError>("reports") })?,
            Route::get("/secure/profile")
                .context("ctx")
                .handler(|args: Args| async move {
                    let subject = args
                        .context("ctx")?
                        .principal
                        .as_ref()
                        .map(|p| p.subject.clone())
                        .unwrap_or_default();
                    Ok::<_, HandlerError>(subject)
                })?,
            Route::get("/login")
                .handler(|_args: Args| async move { Ok::<_, HandlerError>(Outcome::redirect("/welcome")) })?,
            Route::delete("/items")
                .on_null(StatusCode::NO_CONTENT, "")
                .handler(|_args: Args| async move { Ok::<_, HandlerError>(()) })?,
            Route::get("/nothing")
                .handler(|_args: Args| async move { Ok::<_, HandlerError>(()) })?,
            Route::post("/temperature")
                .consumes("text/x-celsius")
                .produces("text/x-celsius")
                .body("reading", ParamType::object::<Temperature>())
                .handler(|args: Args| async move {
                    let reading = args.object::<Temperature>("reading")?;
                    Ok::<_, HandlerError>(Reply::object(Temperature {
                        celsius: reading.celsius + 1.0,
                    }))
                })?,
            Route::get("/temperature/json")
                .handler(|_args: Args| async move {
                    Ok::<_, HandlerError>(Reply::object(Temperature { celsius: 21.5 }))
                })?,
            Route::get("/pages/*")
                .path_param("path")
                .serve_from(self.files.clone(), true)
                .handler(|args: Args| async move {
                    let path = args.str("path")?;
                    Ok::<_, HandlerError>(path.trim_start_matches("/pages").to_string())
                })?,
            Route::get("/download")
                .handler(move |_args: Args| {
                    let report = report.clone();
                    async move { Ok::<_, HandlerError>(FileRef::new(report).named("report.txt")) }
                })?,
            Route::get("/teapot")
                .handler(|_args: Args| async move {
                    Ok::<_, HandlerError>(Outcome::new("short and stout").with_hook(|draft| {
                        draft.status = StatusCode::IM_A_TEAPOT;
                        draft.set_content_type("text/plain");
                        HookFlow::Continue
                    }))
                })?,
            Route::get("/hooked")
                .handler(|_args: Args| async move {
                    Ok::<_, HandlerError>(Outcome::new("ignored").with_hook(|draft| {
                        draft.status = StatusCode::ACCEPTED;
                        draft.set_body("from hook");
                        HookFlow::Finished
                    }))
                })?,
            Route::get("/flaky")
                .retry(RetryPolicy::new(3, Duration::from_millis(5)))
                .handler(move |_args: Args| {
                    let attempts = Arc::clone(&attempts);
                    async move {
                        if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(HandlerError::new("not yet"))
                        } else {
                            Ok("third time lucky")
                        }
                    }
                })?,
            Route::get("/broken")
                .handler(|_args: Args| async move { Err::<(), _>(HandlerError::new("database unavailable")) })?,
            Route::get("/blocking")
                .query("n", ParamType::Int)
                .blocking_handler(|args: Args| {
                    let n = args.i32("n")?;
                    Ok::<_, HandlerError>((1..=n).product::<i32>())
                })?,
            Route::get("/mapping")
                .handler(|_args: Args| async move {
                    let mut map = std::collections::BTreeMap::new();
                    map.insert("a".to_string(), 1i64);
                    map.insert("b".to_string(), 2i64);
                    Ok::<_, HandlerError>(map)
                })?,
        ])
    }

    fn converters(&self, registry: &mut ConverterRegistryBuilder) -> Result<(), RegistryError> {
        registry.register_from("celsius_in", "text/x-celsius", |b: &[u8]| {
            String::from_utf8_lossy(b)
                .trim()
                .parse::<f64>()
                .map(|celsius| Temperature { celsius })
        })?;
        registry.register_to("celsius_out", "text/x-celsius", |t: &Temperature| {
            Ok::<_, String>(format!("{}C", t.celsius).into_bytes())
        })
    }

    fn rpc_objects(&self) -> Vec<RpcObject> {
        vec![
            switchyard::demo::calculator(),
            RpcObject::new("Hidden", "/rpc/hidden"),
        ]
    }
}

/// Engine with the fixtures registered and `/secure` protected.
pub fn engine() -> (Engine, Arc<AtomicU32>) {
    let fixtures = Fixtures::new();
    let attempts = Arc::clone(&fixtures.attempts);
    let engine = Engine::builder()
        .template_engine(switchyard::render::PlaceholderTemplates)
        .register(&fixtures, &["/secure"])
        .unwrap()
        .build()
        .unwrap();
    (engine, attempts)
}
