//! Bearer-token authentication.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::config::AuthConfig;

use super::Principal;

/// Token → principal lookup built from configuration.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    tokens: HashMap<String, Principal>,
}

impl TokenTable {
    pub fn from_config(config: &AuthConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|t| (t.token.clone(), Principal::new(&t.subject, &t.roles)))
            .collect();
        Self { tokens }
    }

    pub fn insert(&mut self, token: impl Into<String>, principal: Principal) {
        self.tokens.insert(token.into(), principal);
    }

    pub fn lookup(&self, token: &str) -> Option<&Principal> {
        self.tokens.get(token)
    }
}

/// Attach a [`Principal`] for a known bearer token.
///
/// Requests without an `Authorization` header pass through anonymously.
/// An unknown token or a non-bearer scheme is rejected with 401.
pub async fn bearer_authn(
    State(table): State<Arc<TokenTable>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|h| h.to_str().map_err(|_| StatusCode::UNAUTHORIZED))
        .transpose()?;

    if let Some(auth_val) = auth_header {
        let principal = bearer_token(auth_val)
            .and_then(|token| table.lookup(token))
            .cloned()
            .ok_or_else(|| {
                tracing::debug!("Rejected unknown bearer token");
                StatusCode::UNAUTHORIZED
            })?;
        request.extensions_mut().insert(principal);
    }

    Ok(next.run(request).await)
}

/// The auth scheme name is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim_start().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|token| !token.is_empty())
}
