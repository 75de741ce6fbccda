//! Error types for the memory engine.
//!
//! Every error carries a human-readable message and an optional key-value
//! detail map. Backend drivers map their native failures onto these kinds;
//! the tool dispatcher converts whatever propagates into an MCP error result.

use std::collections::BTreeMap;

/// Optional structured context attached to an error.
pub type ErrorDetails = BTreeMap<String, String>;

/// Errors the engine distinguishes.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MemoryGraphError {
    /// Input failed local validation (empty title, out-of-range score, ...)
    #[error("Validation error: {message}")]
    Validation { message: String, details: ErrorDetails },

    /// A requested memory does not exist
    #[error("Memory not found: {memory_id}")]
    MemoryNotFound { memory_id: String, details: ErrorDetails },

    /// Relationship operation failed (missing endpoint, self-loop, ...)
    #[error("Relationship error: {message}")]
    Relationship { message: String, details: ErrorDetails },

    /// The underlying store is not reachable or a query against it failed
    #[error("Backend unavailable: {message}")]
    BackendUnavailable { message: String, details: ErrorDetails },

    /// Credentials were rejected by the backend
    #[error("Authentication failed: {message}")]
    AuthFailure { message: String, details: ErrorDetails },

    /// A hosted backend reported that the account's usage limit was reached
    #[error("Usage limit exceeded: {message}")]
    UsageLimitExceeded { message: String, details: ErrorDetails },

    /// A hosted backend rate-limited the request
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        message: String,
        /// Seconds to wait before retrying, when the server said so
        retry_after: Option<u64>,
        details: ErrorDetails,
    },

    /// The circuit breaker around a remote backend is open; failing fast
    #[error("Circuit open: {message}")]
    CircuitOpen { message: String, details: ErrorDetails },

    /// Schema creation or migration failed
    #[error("Schema error: {message}")]
    Schema { message: String, details: ErrorDetails },

    /// The backend cannot interpret a free-form query in this dialect
    #[error("Unsupported query: {message}")]
    UnsupportedQuery { message: String, details: ErrorDetails },

    /// Filesystem failure during export/import
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, MemoryGraphError>;

impl MemoryGraphError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), details: ErrorDetails::new() }
    }

    pub fn memory_not_found(memory_id: impl Into<String>) -> Self {
        Self::MemoryNotFound { memory_id: memory_id.into(), details: ErrorDetails::new() }
    }

    pub fn relationship(message: impl Into<String>) -> Self {
        Self::Relationship { message: message.into(), details: ErrorDetails::new() }
    }

    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable { message: message.into(), details: ErrorDetails::new() }
    }

    pub fn auth_failure(message: impl Into<String>) -> Self {
        Self::AuthFailure { message: message.into(), details: ErrorDetails::new() }
    }

    pub fn usage_limit(message: impl Into<String>) -> Self {
        Self::UsageLimitExceeded { message: message.into(), details: ErrorDetails::new() }
    }

    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self::RateLimitExceeded {
            message: message.into(),
            retry_after,
            details: ErrorDetails::new(),
        }
    }

    pub fn circuit_open(message: impl Into<String>) -> Self {
        Self::CircuitOpen { message: message.into(), details: ErrorDetails::new() }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema { message: message.into(), details: ErrorDetails::new() }
    }

    pub fn unsupported_query(message: impl Into<String>) -> Self {
        Self::UnsupportedQuery { message: message.into(), details: ErrorDetails::new() }
    }

    /// Attach a key-value detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Some(details) = self.details_mut() {
            details.insert(key.into(), value.into());
        }
        self
    }

    /// The detail map, when the variant carries one.
    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            Self::Validation { details, .. }
            | Self::MemoryNotFound { details, .. }
            | Self::Relationship { details, .. }
            | Self::BackendUnavailable { details, .. }
            | Self::AuthFailure { details, .. }
            | Self::UsageLimitExceeded { details, .. }
            | Self::RateLimitExceeded { details, .. }
            | Self::CircuitOpen { details, .. }
            | Self::Schema { details, .. }
            | Self::UnsupportedQuery { details, .. } => Some(details),
            Self::Io(_) => None,
        }
    }

    fn details_mut(&mut self) -> Option<&mut ErrorDetails> {
        match self {
            Self::Validation { details, .. }
            | Self::MemoryNotFound { details, .. }
            | Self::Relationship { details, .. }
            | Self::BackendUnavailable { details, .. }
            | Self::AuthFailure { details, .. }
            | Self::UsageLimitExceeded { details, .. }
            | Self::RateLimitExceeded { details, .. }
            | Self::CircuitOpen { details, .. }
            | Self::Schema { details, .. }
            | Self::UnsupportedQuery { details, .. } => Some(details),
            Self::Io(_) => None,
        }
    }

    /// Whether a retry with back-off is worth attempting.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. } | Self::RateLimitExceeded { .. } | Self::Io(_)
        )
    }
}

impl From<rusqlite::Error> for MemoryGraphError {
    fn from(err: rusqlite::Error) -> Self {
        Self::backend_unavailable(format!("SQLite error: {err}"))
    }
}

impl From<serde_json::Error> for MemoryGraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(format!("Invalid JSON: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_round_trip() {
        let err = MemoryGraphError::relationship("endpoints missing")
            .with_detail("from_id", "a")
            .with_detail("to_id", "b");
        let details = err.details().unwrap();
        assert_eq!(details.get("from_id").map(String::as_str), Some("a"));
        assert_eq!(details.get("to_id").map(String::as_str), Some("b"));
        assert!(err.to_string().contains("endpoints missing"));
    }

    #[test]
    fn test_retriable_classification() {
        assert!(MemoryGraphError::backend_unavailable("down").is_retriable());
        assert!(MemoryGraphError::rate_limit("slow down", Some(3)).is_retriable());
        assert!(!MemoryGraphError::validation("bad title").is_retriable());
        assert!(!MemoryGraphError::circuit_open("open").is_retriable());
    }
}
