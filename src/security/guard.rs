//! Authorization guard.

use axum::http::StatusCode;
use thiserror::Error;

use super::Principal;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("caller lacks required roles ({})", required.join(", "))]
    Forbidden { required: Vec<String> },
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }
}

/// Check a caller against a route's requirements.
///
/// Routes under a protected prefix reject anonymous callers with
/// [`AuthError::Unauthenticated`]. Otherwise the caller must hold every role
/// in `required_roles`.
pub fn authorize(
    authenticated: bool,
    required_roles: &[String],
    principal: Option<&Principal>,
) -> Result<(), AuthError> {
    if authenticated && principal.is_none() {
        return Err(AuthError::Unauthenticated);
    }
    if required_roles.is_empty() {
        return Ok(());
    }

    let granted = principal
        .map(|p| required_roles.iter().all(|role| p.has_role(role)))
        .unwrap_or(false);

    if granted {
        Ok(())
    } else {
        Err(AuthError::Forbidden {
            required: required_roles.to_vec(),
        })
    }
}
