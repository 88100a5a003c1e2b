//! Error types for the gateway.
//!
//! Every fallible operation in the workspace returns [`GatewayError`]. The
//! variants fall into three groups that drive the retry policy:
//! - fatal errors (configuration, validation, cancellation, authentication)
//!   which are surfaced immediately
//! - transient errors (provider, timeout, streaming) which consume the
//!   retry budget
//! - registry and transport errors which never reach a backend

use std::time::Duration;
use thiserror::Error;

/// Result alias used across the gateway crates
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error taxonomy
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Static adapter configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Request or resolved options are out of range
    #[error("Validation error: {message}")]
    Validation {
        /// Error message
        message: String,
        /// Offending field, if known
        field: Option<String>,
        /// Machine readable code
        code: String,
    },

    /// A completion was requested with an empty prompt
    #[error("empty prompt")]
    EmptyPrompt,

    /// The execution context was cancelled while waiting for a rate limit token
    #[error("rate limit wait cancelled")]
    RateLimitCancelled,

    /// The execution context was cancelled
    #[error("request cancelled")]
    Cancelled,

    /// The backend rejected the credentials
    #[error("Authentication error: {message}")]
    Authentication {
        /// Error message
        message: String,
    },

    /// Backend returned an error or could not be reached
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
        /// HTTP status returned by the backend
        status_code: Option<u16>,
        /// Whether the backend marked the failure as transient
        retryable: bool,
    },

    /// Backend call exceeded its deadline
    #[error("Request timed out after {timeout:?}")]
    Timeout {
        /// Configured deadline
        timeout: Duration,
    },

    /// Incremental response failed mid-flight
    #[error("Streaming error: {message}")]
    Streaming {
        /// Error message
        message: String,
    },

    /// Every attempt of the retry budget failed
    #[error("all {attempts} attempts failed: {source}")]
    AllAttemptsFailed {
        /// Number of attempts performed
        attempts: u32,
        /// Last observed error
        #[source]
        source: Box<GatewayError>,
    },

    /// A provider with the same name is already registered
    #[error("provider {name} already registered")]
    DuplicateProvider {
        /// Provider name
        name: String,
    },

    /// No provider is registered under the requested name
    #[error("provider {name} not found")]
    ProviderNotFound {
        /// Provider name
        name: String,
    },

    /// Inbound request could not be decoded
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message
        message: String,
    },

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(
        message: impl Into<String>,
        field: Option<String>,
        code: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field,
            code: code.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a provider error
    pub fn provider(
        provider: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
        retryable: bool,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status_code,
            retryable,
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    /// Create a streaming error
    pub fn streaming(message: impl Into<String>) -> Self {
        Self::Streaming {
            message: message.into(),
        }
    }

    /// Wrap the last error of an exhausted retry budget
    #[must_use]
    pub fn all_attempts_failed(attempts: u32, last: Self) -> Self {
        Self::AllAttemptsFailed {
            attempts,
            source: Box::new(last),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Malformed input or out-of-range parameters
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::EmptyPrompt | Self::Configuration { .. }
        )
    }

    /// Execution context cancellation, including while rate limited
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::RateLimitCancelled)
    }

    /// Errors that must stop a retry loop immediately
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.is_validation()
            || self.is_cancellation()
            || matches!(self, Self::Authentication { .. })
    }

    /// Whether the error was raised by the registry rather than a backend
    #[must_use]
    pub fn is_registry(&self) -> bool {
        matches!(
            self,
            Self::DuplicateProvider { .. } | Self::ProviderNotFound { .. }
        )
    }

    /// Short machine readable error type
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Validation { .. } | Self::EmptyPrompt => "invalid_request_error",
            Self::RateLimitCancelled | Self::Cancelled => "cancelled",
            Self::Authentication { .. } => "authentication_error",
            Self::Provider { .. } | Self::AllAttemptsFailed { .. } => "provider_error",
            Self::Timeout { .. } => "timeout_error",
            Self::Streaming { .. } => "stream_error",
            Self::DuplicateProvider { .. } | Self::ProviderNotFound { .. } => "registry_error",
            Self::BadRequest { .. } => "bad_request",
            Self::Internal { .. } => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(GatewayError::EmptyPrompt.is_fatal());
        assert!(GatewayError::validation("bad", None, "bad").is_fatal());
        assert!(GatewayError::configuration("bad").is_fatal());
        assert!(GatewayError::Cancelled.is_fatal());
        assert!(GatewayError::RateLimitCancelled.is_fatal());
        assert!(GatewayError::authentication("denied").is_fatal());

        assert!(!GatewayError::provider("p", "boom", Some(503), true).is_fatal());
        assert!(!GatewayError::timeout(Duration::from_secs(1)).is_fatal());
        assert!(!GatewayError::streaming("eof").is_fatal());
    }

    #[test]
    fn test_all_attempts_failed_keeps_source() {
        let err = GatewayError::all_attempts_failed(
            3,
            GatewayError::provider("openrouter", "status 503", Some(503), true),
        );
        let message = err.to_string();
        assert!(message.starts_with("all 3 attempts failed"));
        assert!(message.contains("status 503"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_registry_errors() {
        let err = GatewayError::ProviderNotFound {
            name: "missing".to_string(),
        };
        assert!(err.is_registry());
        assert_eq!(err.to_string(), "provider missing not found");
        assert_eq!(err.error_type(), "registry_error");
    }
}
