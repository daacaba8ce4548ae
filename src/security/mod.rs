//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → authn.rs (bearer token → Principal extension)
//!     → routing
//!     → guard.rs (authenticated / required roles)
//!     → binding
//! ```
//!
//! # Design Decisions
//! - Fail closed: an unknown token is rejected before routing
//! - Anonymous callers pass authn; the guard decides per route
//! - Role checks run before any argument is bound

pub mod authn;
pub mod guard;

use std::collections::BTreeSet;

pub use authn::{bearer_authn, TokenTable};
pub use guard::{authorize, AuthError};

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub roles: BTreeSet<String>,
}

impl Principal {
    pub fn new<I, S>(subject: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject: subject.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
