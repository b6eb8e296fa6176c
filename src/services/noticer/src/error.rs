//! Error handling for noticer
//!
//! Per-endpoint problems are described by [`Failure`] values. The dispatcher keeps
//! them local while it fails over, and only the terminal [`NoticeError`] reaches
//! the caller, carrying the most recent failure's code, message and context.

use noticer_shared::{ChannelKind, Context};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type alias for noticer operations
pub type Result<T> = std::result::Result<T, NoticeError>;

/// Classification of a single failed delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Endpoint skipped because its local rate-limit window is exhausted
    CoolingDown,
    /// No interpretable response: network error or non-200 status
    TransportError,
    /// Response lacks the provider's success/error discriminant
    MalformedResponse,
    /// Provider answered with its own rate-limit code
    ProviderRateLimited,
    /// Any other non-success discriminant
    ProviderError,
}

impl FailureKind {
    /// Offset added to the channel's error base to form the numeric code
    pub fn code_offset(&self) -> i32 {
        match self {
            FailureKind::TransportError => 1,
            FailureKind::MalformedResponse => 2,
            FailureKind::CoolingDown | FailureKind::ProviderRateLimited => 3,
            FailureKind::ProviderError => 4,
        }
    }

    /// Whether this failure deserves alerting-level log output
    ///
    /// Rate limiting is the expected steady state under load.
    pub fn is_alertable(&self) -> bool {
        !matches!(
            self,
            FailureKind::CoolingDown | FailureKind::ProviderRateLimited
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::CoolingDown => "cooling_down",
            FailureKind::TransportError => "transport_error",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::ProviderRateLimited => "provider_rate_limited",
            FailureKind::ProviderError => "provider_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded delivery failure
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    pub code: i32,
    pub message: String,
    pub context: Context,
}

impl Failure {
    pub fn new<S: Into<String>>(
        channel: ChannelKind,
        kind: FailureKind,
        message: S,
        context: Context,
    ) -> Self {
        Self {
            kind,
            code: channel.error_base() + kind.code_offset(),
            message: message.into(),
            context,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Main error type for noticer
#[derive(Error, Debug)]
pub enum NoticeError {
    /// Every endpoint of a failover dispatch failed or was cooling down
    #[error("{}", exhausted_message(.last))]
    Exhausted { last: Option<Box<Failure>> },

    /// Provider rejected a single-target notification
    #[error("{message}")]
    Provider {
        code: i32,
        message: String,
        context: Context,
    },

    /// Provider reported its frequency limit for a single-target notification
    #[error("{message}")]
    RateLimited {
        code: i32,
        message: String,
        context: Context,
    },

    /// Message could not be encoded, e.g. a required option was never set
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// HTTP transport errors
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Counter store or ticket cache errors
    #[error("Store error: {message}")]
    Store { message: String },

    /// Timeout errors
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Email building or SMTP errors
    #[error("Email error: {message}")]
    Email { message: String },
}

fn exhausted_message(last: &Option<Box<Failure>>) -> String {
    match last {
        Some(failure) => failure.message.clone(),
        None => "notice failed, no endpoint available".to_string(),
    }
}

impl NoticeError {
    /// Machine-readable numeric code of the failure, 0 when none applies
    pub fn code(&self) -> i32 {
        match self {
            NoticeError::Exhausted { last } => last.as_ref().map_or(0, |f| f.code),
            NoticeError::Provider { code, .. } | NoticeError::RateLimited { code, .. } => *code,
            _ => 0,
        }
    }

    /// Human-readable message
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Structured context of the failure, if any was recorded
    pub fn context(&self) -> Option<&Context> {
        match self {
            NoticeError::Exhausted { last } => last.as_ref().map(|f| &f.context),
            NoticeError::Provider { context, .. } | NoticeError::RateLimited { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// The last per-endpoint failure of an exhausted dispatch
    pub fn last_failure(&self) -> Option<&Failure> {
        match self {
            NoticeError::Exhausted { last } => last.as_deref(),
            _ => None,
        }
    }

    /// Get the error code tag for logs and API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            NoticeError::Exhausted { .. } => "ALL_ENDPOINTS_EXHAUSTED",
            NoticeError::Provider { .. } => "PROVIDER_ERROR",
            NoticeError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            NoticeError::Encode { .. } => "ENCODE_ERROR",
            NoticeError::Transport { .. } => "TRANSPORT_ERROR",
            NoticeError::Store { .. } => "STORE_ERROR",
            NoticeError::Timeout { .. } => "TIMEOUT",
            NoticeError::Config { .. } => "CONFIG_ERROR",
            NoticeError::Serialization { .. } => "SERIALIZATION_ERROR",
            NoticeError::Email { .. } => "EMAIL_ERROR",
        }
    }

    /// Check if a later call with the same input may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            NoticeError::Exhausted { .. } => true,
            NoticeError::Provider { .. } => false,
            NoticeError::RateLimited { .. } => true,
            NoticeError::Encode { .. } => false,
            NoticeError::Transport { .. } => true,
            NoticeError::Store { .. } => true,
            NoticeError::Timeout { .. } => true,
            NoticeError::Config { .. } => false,
            NoticeError::Serialization { .. } => false,
            NoticeError::Email { .. } => true,
        }
    }
}

impl From<Failure> for NoticeError {
    fn from(failure: Failure) -> Self {
        match failure.kind {
            FailureKind::CoolingDown | FailureKind::ProviderRateLimited => {
                NoticeError::RateLimited {
                    code: failure.code,
                    message: failure.message,
                    context: failure.context,
                }
            }
            _ => NoticeError::Provider {
                code: failure.code,
                message: failure.message,
                context: failure.context,
            },
        }
    }
}

// Conversion implementations for external error types

impl From<redis::RedisError> for NoticeError {
    fn from(err: redis::RedisError) -> Self {
        NoticeError::Store {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for NoticeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NoticeError::Timeout {
                operation: "HTTP request".to_string(),
            }
        } else {
            NoticeError::Transport {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for NoticeError {
    fn from(err: serde_json::Error) -> Self {
        NoticeError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for NoticeError {
    fn from(err: config::ConfigError) -> Self {
        NoticeError::Config {
            message: err.to_string(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for NoticeError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        NoticeError::Timeout {
            operation: err.to_string(),
        }
    }
}

#[cfg(feature = "email")]
impl From<lettre::error::Error> for NoticeError {
    fn from(err: lettre::error::Error) -> Self {
        NoticeError::Email {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "email")]
impl From<lettre::address::AddressError> for NoticeError {
    fn from(err: lettre::address::AddressError) -> Self {
        NoticeError::Email {
            message: err.to_string(),
        }
    }
}

// Utility functions for creating specific error types

impl NoticeError {
    /// Create an encode error
    pub fn encode<S: Into<String>>(message: S) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an email error
    pub fn email<S: Into<String>>(message: S) -> Self {
        Self::Email {
            message: message.into(),
        }
    }
}
