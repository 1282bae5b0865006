//! Error handling for Ignite Core.
//!
//! This module provides:
//! - A single error type carrying a machine-readable code and context
//! - Severity classification driving how errors are logged
//! - Metrics integration for error tracking
//! - An extension trait for attaching context to foreign errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use ignite_core::error::{IgniteError, Result, ErrorContext, ErrorCode};
//!
//! fn load() -> Result<String> {
//!     std::fs::read_to_string("ignite.toml").with_error_code(ErrorCode::ConfigurationError)
//! }
//! ```

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for Ignite operations.
pub type Result<T> = std::result::Result<T, IgniteError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Startup Errors (1000-1099)
    TaskFailed,
    StartupCancelled,
    AdmissionDenied,

    // Host Errors (1100-1199)
    StartAlreadyInProgress,
    UiThreadUnavailable,
    UiDispatchFailed,
    WindowCreationFailed,

    // Service Errors (1200-1299)
    ServiceNotRegistered,
    ServiceResolutionFailed,

    // Probe Errors (1300-1399)
    ProbeFailed,
    ProbeTimeout,
    NetworkError,

    // Serialization Errors (2200-2299)
    SerializationError,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    InvalidConfiguration,

    // Internal Errors (9000-9099)
    InternalError,
    IoError,
    UnknownError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::TaskFailed => 1000,
            Self::StartupCancelled => 1001,
            Self::AdmissionDenied => 1002,

            Self::StartAlreadyInProgress => 1100,
            Self::UiThreadUnavailable => 1102,
            Self::UiDispatchFailed => 1103,
            Self::WindowCreationFailed => 1104,

            Self::ServiceNotRegistered => 1200,
            Self::ServiceResolutionFailed => 1201,

            Self::ProbeFailed => 1300,
            Self::ProbeTimeout => 1301,
            Self::NetworkError => 1302,

            Self::SerializationError => 2200,

            Self::ConfigurationError => 5000,
            Self::InvalidConfiguration => 5001,

            Self::InternalError => 9000,
            Self::IoError => 9001,
            Self::UnknownError => 9099,
        }
    }

    /// Check if this error is retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProbeFailed | Self::ProbeTimeout | Self::NetworkError | Self::UiDispatchFailed
        )
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "startup",
            1100..=1199 => "host",
            1200..=1299 => "services",
            1300..=1399 => "probe",
            2200..=2299 => "serialization",
            5000..=5099 => "configuration",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Expected outcomes (cancellation, duplicate start)
    Low,
    /// Operational issues (timeouts, flaky probes)
    Medium,
    /// Failures that abort startup
    High,
    /// Critical errors requiring immediate attention
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::StartupCancelled
            | ErrorCode::StartAlreadyInProgress => Self::Low,

            ErrorCode::ProbeFailed
            | ErrorCode::ProbeTimeout
            | ErrorCode::NetworkError
            | ErrorCode::UiDispatchFailed => Self::Medium,

            ErrorCode::TaskFailed
            | ErrorCode::AdmissionDenied
            | ErrorCode::WindowCreationFailed
            | ErrorCode::ServiceNotRegistered
            | ErrorCode::ServiceResolutionFailed
            | ErrorCode::SerializationError
            | ErrorCode::ConfigurationError
            | ErrorCode::InvalidConfiguration
            | ErrorCode::IoError => Self::High,

            ErrorCode::UiThreadUnavailable
            | ErrorCode::InternalError
            | ErrorCode::UnknownError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Related entity ID (task name, service name, type name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Suggested action for resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_action = Some(suggestion.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Ignite Core.
#[derive(Error, Debug)]
pub struct IgniteError {
    /// Machine-readable error code
    code: ErrorCode,

    /// Human-readable error message
    message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for IgniteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl IgniteError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and message.
    pub fn new(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            message: message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both a message and an internal message.
    pub fn with_internal(
        code: ErrorCode,
        message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "An internal error occurred", message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message.into())
    }

    /// Startup was cancelled before or during a task.
    pub fn cancelled(stage: impl Into<String>) -> Self {
        let stage = stage.into();
        Self::new(ErrorCode::StartupCancelled, format!("Startup cancelled during {}", stage))
            .with_details(ErrorDetails::new().with_entity("stage", stage))
    }

    /// A required startup task failed.
    pub fn task_failed(task: impl Into<String>, source: IgniteError) -> Self {
        let task = task.into();
        Self::new(
            ErrorCode::TaskFailed,
            format!("Startup task '{}' failed: {}", task, source.message()),
        )
        .with_details(ErrorDetails::new().with_entity("startup_task", &task))
        .with_source(source)
    }

    /// A service capability could not be resolved.
    pub fn service_not_registered(type_name: &str) -> Self {
        Self::new(
            ErrorCode::ServiceNotRegistered,
            format!("Required service '{}' is not registered", type_name),
        )
        .with_details(
            ErrorDetails::new()
                .with_entity("service", type_name)
                .with_suggestion("Register the service before starting the application"),
        )
    }

    /// Health admission was denied.
    pub fn admission_denied(summary: impl Into<String>) -> Self {
        Self::new(ErrorCode::AdmissionDenied, summary.into())
    }

    /// The UI thread is gone or refused the job.
    pub fn ui_unavailable(reason: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::UiThreadUnavailable,
            "The UI thread is not available",
            reason,
        )
    }

    /// A probe failed without producing a result.
    pub fn probe_failed(service: impl Into<String>, reason: impl Into<String>) -> Self {
        let service = service.into();
        Self::new(
            ErrorCode::ProbeFailed,
            format!("Probe '{}' failed: {}", service, reason.into()),
        )
        .with_details(ErrorDetails::new().with_entity("service", service))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    /// Add internal message.
    pub fn with_internal_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = Some(message.into());
        self
    }

    /// Add context to details.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Get the error details.
    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// True when the error represents cancellation rather than failure.
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::StartupCancelled
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    message = %self.message,
                    internal_message = ?self.internal_message,
                    details = ?self.details,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    message = %self.message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    message = %self.message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    message = %self.message,
                    "Low severity error"
                );
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metrics
    // ─────────────────────────────────────────────────────────────────────────

    fn record_metrics(&self) {
        counter!(
            "ignite_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with error code.
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| IgniteError::internal(message.into()).with_source(e))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| IgniteError::new(code, e.to_string()).with_source(e))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| IgniteError::new(ErrorCode::ServiceResolutionFailed, message.into()))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.ok_or_else(|| IgniteError::new(code, "Value not present"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════════════════

impl From<serde_json::Error> for IgniteError {
    fn from(error: serde_json::Error) -> Self {
        IgniteError::new(ErrorCode::SerializationError, "Failed to process JSON data")
            .with_internal_message(error.to_string())
            .with_source(error)
    }
}

impl From<reqwest::Error> for IgniteError {
    fn from(error: reqwest::Error) -> Self {
        let code = if error.is_timeout() {
            ErrorCode::ProbeTimeout
        } else {
            ErrorCode::NetworkError
        };
        IgniteError::new(code, "HTTP request failed")
            .with_internal_message(error.to_string())
            .with_source(error)
    }
}

impl From<tokio::time::error::Elapsed> for IgniteError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        IgniteError::new(ErrorCode::ProbeTimeout, "Operation timed out").with_source(error)
    }
}

impl From<std::io::Error> for IgniteError {
    fn from(error: std::io::Error) -> Self {
        IgniteError::new(ErrorCode::IoError, "I/O operation failed")
            .with_internal_message(error.to_string())
            .with_source(error)
    }
}

impl From<anyhow::Error> for IgniteError {
    fn from(error: anyhow::Error) -> Self {
        IgniteError::internal(format!("{:#}", error))
    }
}

impl From<config::ConfigError> for IgniteError {
    fn from(error: config::ConfigError) -> Self {
        IgniteError::new(ErrorCode::ConfigurationError, "Failed to load configuration")
            .with_internal_message(error.to_string())
            .with_source(error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_categories() {
        assert_eq!(ErrorCode::TaskFailed.category(), "startup");
        assert_eq!(ErrorCode::UiThreadUnavailable.category(), "host");
        assert_eq!(ErrorCode::ServiceNotRegistered.category(), "services");
        assert_eq!(ErrorCode::ProbeTimeout.category(), "probe");
        assert_eq!(ErrorCode::InvalidConfiguration.category(), "configuration");
        assert_eq!(ErrorCode::UnknownError.category(), "internal");
    }

    #[test]
    fn test_error_code_is_retryable() {
        assert!(ErrorCode::ProbeTimeout.is_retryable());
        assert!(ErrorCode::NetworkError.is_retryable());
        assert!(!ErrorCode::TaskFailed.is_retryable());
        assert!(!ErrorCode::AdmissionDenied.is_retryable());
    }

    #[test]
    fn test_task_failed_wraps_source() {
        let inner = IgniteError::internal("boom");
        let err = IgniteError::task_failed("migrate", inner);
        assert_eq!(err.code(), ErrorCode::TaskFailed);
        assert!(err.message().contains("migrate"));
        assert_eq!(err.details().entity_id.as_deref(), Some("migrate"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_cancelled_is_not_failure() {
        let err = IgniteError::cancelled("startup task 'seed'");
        assert!(err.is_cancelled());
        assert_eq!(err.severity(), ErrorSeverity::Low);
    }

    #[test]
    fn test_service_not_registered_names_type() {
        let err = IgniteError::service_not_registered("app::Repository");
        assert!(err.to_string().contains("app::Repository"));
        assert!(err.details().suggested_action.is_some());
    }

    #[test]
    fn test_error_context() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        let err = result.with_error_code(ErrorCode::ConfigurationError).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);

        let none: Option<u32> = None;
        let err = none.context("no value").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ServiceResolutionFailed);
    }

    #[test]
    fn test_error_display() {
        let err = IgniteError::with_internal(ErrorCode::ProbeFailed, "probe down", "refused");
        assert_eq!(err.to_string(), "[ProbeFailed] probe down (internal: refused)");
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(ErrorSeverity::from_code(&ErrorCode::InternalError), ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::from_code(&ErrorCode::TaskFailed), ErrorSeverity::High);
        assert_eq!(ErrorSeverity::from_code(&ErrorCode::ProbeTimeout), ErrorSeverity::Medium);
    }
}
