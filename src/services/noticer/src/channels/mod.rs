//! Notification channels module
//!
//! This module contains one wrapper per provider:
//! - Group robots (DingTalk, Yach) with multi-endpoint failover
//! - Worker robots (DingTalk, Yach) for direct messages
//! - SMS gateway
//! - Voice calls
//! - Email (SMTP)

use noticer_shared::ChannelKind;

#[cfg(feature = "email")]
pub mod email;
pub mod group;
pub mod phone;
pub mod provider;
pub mod sms;
pub mod worker;

#[cfg(feature = "email")]
pub use email::{EmailChannel, EmailMessage, Priority};
pub use group::{DingGroupChannel, YachGroupChannel};
pub use phone::PhoneChannel;
pub use sms::SmsChannel;
pub use worker::{DingWorkerChannel, WorkerRecipients, YachWorkerChannel};

/// Implemented by every channel for introspection
pub trait NoticeChannel: Send + Sync {
    fn channel_info(&self) -> ChannelInfo;
}

/// Information about a notification channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub kind: ChannelKind,
    pub description: String,
    pub enabled: bool,
    /// Whether the channel fails over between several endpoints
    pub supports_failover: bool,
    /// Attempts allowed per endpoint and cooldown window
    pub window_limit: Option<u64>,
}
