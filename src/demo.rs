//! Demonstration module served by the `switchyard` binary.
//!
//! Registers:
//! - `GET /concatenate?str1&str2[&str3]`
//! - `GET /admin/stats` (role `admin`, under the protected `/admin` prefix)
//! - `GET /old-home` redirecting to `/`
//! - `POST /points` decoding a `text/csv` point and echoing it as JSON
//! - `Calculator` JSON-RPC object at `/rpc/calculator` with scheme export

use serde::Serialize;

use crate::convert::{ConverterRegistryBuilder, RegistryError};
use crate::engine::Module;
use crate::handler::{Args, HandlerError, Outcome, ParamType, Reply};
use crate::routing::{PatternError, Route, RouteDescriptor};
use crate::rpc::{Export, RpcMethod, RpcObject};

/// Point parsed from `x,y` text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn parse_csv(bytes: &[u8]) -> Result<Self, String> {
        let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
        let (x, y) = text
            .trim()
            .split_once(',')
            .ok_or_else(|| format!("expected `x,y`, got `{text}`"))?;
        let coordinate = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| format!("bad coordinate `{v}`: {e}"))
        };
        Ok(Point {
            x: coordinate(x)?,
            y: coordinate(y)?,
        })
    }
}

#[derive(Debug, Default)]
pub struct DemoModule;

impl Module for DemoModule {
    fn name(&self) -> &str {
        "demo"
    }

    fn routes(&self) -> Result<Vec<RouteDescriptor>, PatternError> {
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
            Route::get("/admin/stats")
                .roles(["admin"])
                .context("ctx")
                .handler(|args: Args| async move {
                    let ctx = args.context("ctx")?;
                    let subject = ctx
                        .principal
                        .as_ref()
                        .map(|p| p.subject.clone())
                        .unwrap_or_default();
                    Ok::<_, HandlerError>(Reply::Document(serde_json::json!({
                        "subject": subject,
                        "request_id": ctx.request_id,
                    })))
                })?,
            Route::get("/old-home")
                .handler(|_args: Args| async move { Ok::<_, HandlerError>(Outcome::redirect("/")) })?,
            Route::post("/points")
                .consumes("text/csv")
                .body("point", ParamType::object::<Point>())
                .handler(|args: Args| async move {
                    let point = args.object::<Point>("point")?;
                    Ok::<_, HandlerError>(Reply::object(*point))
                })?,
        ])
    }

    fn converters(&self, registry: &mut ConverterRegistryBuilder) -> Result<(), RegistryError> {
        registry.register_from("point_csv", "text/csv", Point::parse_csv)?;
        registry.register_to("point_csv", "text/csv", |p: &Point| {
            Ok::<_, String>(format!("{},{}", p.x, p.y).into_bytes())
        })
    }

    fn rpc_objects(&self) -> Vec<RpcObject> {
        vec![calculator()]
    }
}

/// `multiply`, `add` and a hidden `bye`.
pub fn calculator() -> RpcObject {
    RpcObject::new("Calculator", "/rpc/calculator")
        .provide_scheme()
        .method(
            RpcMethod::builder("multiply")
                .param("a", ParamType::Long)
                .param("b", ParamType::Long)
                .returns(ParamType::Long)
                .handler(|args: Args| async move {
                    Ok::<_, HandlerError>(args.i64("a")? * args.i64("b")?)
                }),
        )
        .method(
            RpcMethod::builder("add")
                .param("a", ParamType::Double)
                .optional("b", ParamType::Double, Some("0"))
                .returns(ParamType::Double)
                .handler(|args: Args| async move {
                    Ok::<_, HandlerError>(args.f64("a")? + args.f64("b")?)
                }),
        )
        .method(
            RpcMethod::builder("bye")
                .export(Export::Exclude)
                .handler(|_args: Args| async move { Ok::<_, HandlerError>("bye") }),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv() {
        assert_eq!(Point::parse_csv(b" 1.5, -2 ").unwrap(), Point { x: 1.5, y: -2.0 });
        assert!(Point::parse_csv(b"1;2").is_err());
        assert!(Point::parse_csv(b"a,2").is_err());
    }

    #[test]
    fn test_demo_routes_compile() {
        assert_eq!(DemoModule.routes().unwrap().len(), 4);
        let names: Vec<String> = calculator().exported().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["multiply", "add"]);
    }
}
