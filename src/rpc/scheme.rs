//! Interface listing for RPC objects.
//!
//! ```text
//! interface Calculator {
//!   multiply(a: long, b: long): long;
//!   greet(name?: string): string;
//! }
//! ```

use std::fmt::Write as _;

use super::object::RpcObject;

/// Describe every exported method of `object`, in registration order.
pub fn render_scheme(object: &RpcObject) -> String {
    let mut out = format!("interface {} {{\n", object.name);
    for method in object.exported() {
        let params: Vec<String> = method
            .params
            .iter()
            .map(|p| {
                let marker = if p.required { "" } else { "?" };
                format!("{}{marker}: {}", p.name, p.ty)
            })
            .collect();
        let returns = method.returns.map(|t| t.type_name()).unwrap_or("void");
        let _ = writeln!(out, "  {}({}): {};", method.name, params.join(", "), returns);
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Args, HandlerError, ParamType};
    use crate::rpc::object::{Export, RpcMethod};

    #[test]
    fn test_render_scheme() {
        let object = RpcObject::new("Calculator", "/calc")
            .method(
                RpcMethod::builder("multiply")
                    .param("a", ParamType::Long)
                    .param("b", ParamType::Long)
                    .returns(ParamType::Long)
                    .handler(|_args: Args| async move { Ok::<_, HandlerError>(0i64) }),
            )
            .method(
                RpcMethod::builder("greet")
                    .optional("name", ParamType::Str, None)
                    .handler(|_args: Args| async move { Ok::<_, HandlerError>(()) }),
            )
            .method(
                RpcMethod::builder("bye")
                    .export(Export::Exclude)
                    .handler(|_args: Args| async move { Ok::<_, HandlerError>(()) }),
            );

        assert_eq!(
            render_scheme(&object),
            "interface Calculator {\n  multiply(a: long, b: long): long;\n  greet(name?: string): void;\n}\n"
        );
    }
}
