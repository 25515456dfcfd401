//! Error types for Sentra.
//!
//! Defines the main error enum used throughout the application.

use std::fmt;
use thiserror::Error;

/// Why an identity exchange was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// Wrong username or password.
    NotAuthorized,
    /// The account exists but has not been confirmed.
    NotConfirmed,
    /// Anything else the identity provider reported.
    Other,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthorized => write!(f, "not authorized"),
            Self::NotConfirmed => write!(f, "not confirmed"),
            Self::Other => write!(f, "failed"),
        }
    }
}

/// Main error type for Sentra operations.
#[derive(Error, Debug)]
pub enum SentraError {
    /// Query service errors (submit failed, results unreadable, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// LLM API errors (rate limits, auth, timeouts, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Conversational memory errors.
    #[error("Memory error: {0}")]
    Memory(String),

    /// Identity provider errors.
    #[error("Authentication {kind}: {message}")]
    Auth { kind: AuthFailure, message: String },

    /// Schema catalog errors.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Access policy violations (denied scope, non read-only SQL).
    #[error("Policy error: {0}")]
    Policy(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SentraError {
    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a memory error with the given message.
    pub fn memory(msg: impl Into<String>) -> Self {
        Self::Memory(msg.into())
    }

    /// Creates an authentication error of the given kind.
    pub fn auth(kind: AuthFailure, msg: impl Into<String>) -> Self {
        Self::Auth {
            kind,
            message: msg.into(),
        }
    }

    /// Creates a catalog error with the given message.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Creates a policy error with the given message.
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Query(_) => "Query Error",
            Self::Llm(_) => "LLM Error",
            Self::Memory(_) => "Memory Error",
            Self::Auth { .. } => "Authentication Error",
            Self::Catalog(_) => "Catalog Error",
            Self::Policy(_) => "Policy Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the auth failure kind, if this is an authentication error.
    pub fn auth_failure(&self) -> Option<AuthFailure> {
        match self {
            Self::Auth { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type alias using SentraError.
pub type Result<T> = std::result::Result<T, SentraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_query() {
        let err = SentraError::query("StartQueryExecution rejected");
        assert_eq!(err.to_string(), "Query error: StartQueryExecution rejected");
        assert_eq!(err.category(), "Query Error");
    }

    #[test]
    fn test_error_display_llm() {
        let err = SentraError::llm("Rate limited. Please wait.");
        assert_eq!(err.to_string(), "LLM error: Rate limited. Please wait.");
        assert_eq!(err.category(), "LLM Error");
    }

    #[test]
    fn test_error_display_auth() {
        let err = SentraError::auth(AuthFailure::NotConfirmed, "user pending");
        assert_eq!(err.to_string(), "Authentication not confirmed: user pending");
        assert_eq!(err.category(), "Authentication Error");
        assert_eq!(err.auth_failure(), Some(AuthFailure::NotConfirmed));
    }

    #[test]
    fn test_auth_failure_absent_for_other_errors() {
        assert_eq!(SentraError::memory("boom").auth_failure(), None);
    }

    #[test]
    fn test_error_display_policy() {
        let err = SentraError::policy("no access to customer records");
        assert_eq!(
            err.to_string(),
            "Policy error: no access to customer records"
        );
        assert_eq!(err.category(), "Policy Error");
    }

    #[test]
    fn test_error_display_config() {
        let err = SentraError::config("missing field 'client_id' in [auth]");
        assert_eq!(
            err.to_string(),
            "Configuration error: missing field 'client_id' in [auth]"
        );
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SentraError>();
    }
}
