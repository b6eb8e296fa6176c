//! Core type definitions shared by every noticer channel
//!
//! This module contains the endpoint description callers pass into a dispatch
//! and the closed set of channels the crate can deliver through.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Structured context attached to failures for postmortem analysis
pub type Context = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// ENDPOINTS
// ============================================================================

/// One deliverable target within a channel, e.g. a group robot webhook token
///
/// The identifier is both the routing target and the rate-limit key. When
/// deserializing, it is read from either `identifier` or `webhook`; the two
/// names are mutually exclusive and a document carrying both is rejected.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(alias = "webhook")]
    identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
}

impl Endpoint {
    pub fn new<S: Into<String>>(identifier: S) -> Self {
        Self {
            identifier: identifier.into(),
            secret: None,
        }
    }

    /// Endpoint that signs every request with the given secret
    pub fn with_secret<S1: Into<String>, S2: Into<String>>(identifier: S1, secret: S2) -> Self {
        let secret = secret.into();
        Self {
            identifier: identifier.into(),
            secret: if secret.is_empty() { None } else { Some(secret) },
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    /// Representation safe to put into logs and error context
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "webhook": self.identifier,
            "signed": self.secret.is_some(),
        })
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("identifier", &self.identifier)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

// ============================================================================
// CHANNELS
// ============================================================================

/// Notification channels supported by noticer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    DingGroup,
    DingWorker,
    Phone,
    Sms,
    Email,
    YachGroup,
    YachWorker,
}

impl ChannelKind {
    /// Channel name used in log lines, metric labels and config sections
    pub fn name(&self) -> &'static str {
        match self {
            ChannelKind::DingGroup => "dinggroup",
            ChannelKind::DingWorker => "dingworker",
            ChannelKind::Phone => "phone",
            ChannelKind::Sms => "sms",
            ChannelKind::Email => "email",
            ChannelKind::YachGroup => "yachgroup",
            ChannelKind::YachWorker => "yachworker",
        }
    }

    /// Base of the numeric error codes reported by this channel
    ///
    /// Codes are `base + 1` (bad status), `+ 2` (missing discriminant),
    /// `+ 3` (rate limited) and `+ 4` (any other provider error).
    pub fn error_base(&self) -> i32 {
        match self {
            ChannelKind::DingGroup => 1000,
            ChannelKind::DingWorker => 2000,
            ChannelKind::Phone => 3000,
            ChannelKind::Sms => 4000,
            ChannelKind::Email => 5000,
            ChannelKind::YachGroup => 6000,
            ChannelKind::YachWorker => 7000,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], "").as_str() {
            "dinggroup" | "ding" => Ok(ChannelKind::DingGroup),
            "dingworker" => Ok(ChannelKind::DingWorker),
            "phone" => Ok(ChannelKind::Phone),
            "sms" => Ok(ChannelKind::Sms),
            "email" => Ok(ChannelKind::Email),
            "yachgroup" | "yach" => Ok(ChannelKind::YachGroup),
            "yachworker" => Ok(ChannelKind::YachWorker),
            _ => Err(format!("Invalid channel: {}", s)),
        }
    }
}
