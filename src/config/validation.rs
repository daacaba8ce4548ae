//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect duplicate bearer tokens
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use super::schema::EngineConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if config.dispatch.max_body_bytes == 0 {
        errors.push(ValidationError::new("dispatch.max_body_bytes", "must be > 0"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level `{}`", config.observability.log_level),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    let mut seen = HashSet::new();
    for (i, token) in config.auth.tokens.iter().enumerate() {
        if token.token.is_empty() {
            errors.push(ValidationError::new(&format!("auth.tokens[{i}].token"), "must not be empty"));
        } else if !seen.insert(token.token.as_str()) {
            errors.push(ValidationError::new(&format!("auth.tokens[{i}].token"), "duplicate token"));
        }
        if token.subject.is_empty() {
            errors.push(ValidationError::new(&format!("auth.tokens[{i}].subject"), "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TokenConfig;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = EngineConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.retries.max_attempts = 0;
        config.observability.log_level = "loud".into();
        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["listener.bind_address", "retries.max_attempts", "observability.log_level"]
        );
    }

    #[test]
    fn test_duplicate_tokens() {
        let mut config = EngineConfig::default();
        let token = TokenConfig {
            token: "t".into(),
            subject: "ann".into(),
            roles: vec![],
        };
        config.auth.tokens = vec![token.clone(), token];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "duplicate token");
    }
}
