//! # Noticer
//!
//! Multi-channel notification delivery providing:
//! - DingTalk and Yach group robots with rate-limited multi-robot failover
//! - DingTalk and Yach worker robots for direct messages
//! - Templated SMS
//! - Text-to-speech voice calls
//! - Email via SMTP
//!
//! ## Failover
//!
//! Group robots are rate limited by their providers. Every robot gets a
//! counter in Redis that allows `window_limit` attempts per `window_seconds`;
//! robots over the limit are skipped, and a message is tried against each
//! remaining robot in order until one accepts it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use noticer::message::ding_group::Text;
//! use noticer::{Endpoint, Noticer, NoticerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let noticer = Noticer::connect(NoticerConfig::from_env()?).await?;
//!
//!     let robots = vec![
//!         Endpoint::new("token-a"),
//!         Endpoint::with_secret("token-b", "SEC..."),
//!     ];
//!     let report = noticer
//!         .ding_group()?
//!         .send(&Text::new("disk usage above 90%").into(), &robots, None)
//!         .await?;
//!     println!("delivered by {} after {} attempts", report.endpoint, report.attempts);
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use tracing::info;

pub mod channels;
pub mod config;
pub mod cooldown;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod metrics;
pub mod store;
pub mod transport;

pub use channels::{
    ChannelInfo, DingGroupChannel, DingWorkerChannel, NoticeChannel, PhoneChannel, SmsChannel,
    WorkerRecipients, YachGroupChannel, YachWorkerChannel,
};
#[cfg(feature = "email")]
pub use channels::{EmailChannel, EmailMessage};
pub use config::NoticerConfig;
pub use cooldown::{CooldownDecision, CooldownGate};
pub use dispatch::{DispatchReport, Dispatcher, ProviderProfile};
pub use error::{Failure, FailureKind, NoticeError, Result};
pub use message::{
    DingGroupMessage, DingWorkerMessage, MessageEncoder, Payload, YachGroupMessage,
    YachWorkerMessage,
};
pub use metrics::DispatchMetrics;
pub use store::{CounterStore, MemoryStore, RedisStore, TicketCache};
pub use transport::{EndpointTransport, RobotHttpTransport, TransportResponse};

// Re-export shared types for convenience
pub use noticer_shared::{ChannelKind, Context, Endpoint};

/// Every enabled channel, built from one configuration
pub struct Noticer {
    config: NoticerConfig,
    metrics: Option<Arc<DispatchMetrics>>,
    ding_group: Option<DingGroupChannel>,
    yach_group: Option<YachGroupChannel>,
    ding_worker: Option<DingWorkerChannel>,
    yach_worker: Option<YachWorkerChannel>,
    sms: Option<SmsChannel>,
    phone: Option<PhoneChannel>,
    #[cfg(feature = "email")]
    email: Option<EmailChannel>,
}

impl Noticer {
    /// Validate the configuration, connect to Redis when a channel needs it and
    /// build every enabled channel
    pub async fn connect(config: NoticerConfig) -> Result<Self> {
        config.validate().map_err(NoticeError::config)?;

        if config.needs_store() {
            let store = Arc::new(RedisStore::connect(&config.redis).await?);
            Self::with_store(config, store).await
        } else {
            Self::with_store(config, Arc::new(MemoryStore::new())).await
        }
    }

    /// Build every enabled channel on top of an existing store
    pub async fn with_store<S>(config: NoticerConfig, store: Arc<S>) -> Result<Self>
    where
        S: CounterStore + TicketCache + 'static,
    {
        info!("Initializing noticer");

        let metrics = if config.metrics.enabled {
            Some(Arc::new(DispatchMetrics::new(&config.metrics)?))
        } else {
            None
        };
        let client = transport::build_http_client(&config.http)?;
        let counters: Arc<dyn CounterStore> = store.clone();
        let tickets: Arc<dyn TicketCache> = store;

        let ding_group = config.ding_group.enabled.then(|| {
            DingGroupChannel::from_config(
                &config.ding_group,
                client.clone(),
                counters.clone(),
                metrics.clone(),
            )
        });
        let yach_group = config.yach_group.enabled.then(|| {
            YachGroupChannel::from_config(
                &config.yach_group,
                client.clone(),
                counters.clone(),
                metrics.clone(),
            )
        });
        let ding_worker = config
            .ding_worker
            .enabled
            .then(|| DingWorkerChannel::new(&config.ding_worker, client.clone(), tickets.clone()));
        let yach_worker = config
            .yach_worker
            .enabled
            .then(|| YachWorkerChannel::new(&config.yach_worker, client.clone(), tickets.clone()));
        let sms = config
            .sms
            .enabled
            .then(|| SmsChannel::new(&config.sms, client.clone(), tickets.clone()));
        let phone = config
            .phone
            .enabled
            .then(|| PhoneChannel::new(&config.phone, client.clone()));
        #[cfg(feature = "email")]
        let email = if config.email.enabled {
            Some(EmailChannel::new(&config.email)?)
        } else {
            None
        };

        let noticer = Self {
            config,
            metrics,
            ding_group,
            yach_group,
            ding_worker,
            yach_worker,
            sms,
            phone,
            #[cfg(feature = "email")]
            email,
        };

        info!(
            channels = noticer.channels().len(),
            "Noticer initialized successfully"
        );
        Ok(noticer)
    }

    pub fn config(&self) -> &NoticerConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<&Arc<DispatchMetrics>> {
        self.metrics.as_ref()
    }

    pub fn ding_group(&self) -> Result<&DingGroupChannel> {
        self.ding_group
            .as_ref()
            .ok_or_else(|| disabled(ChannelKind::DingGroup))
    }

    pub fn yach_group(&self) -> Result<&YachGroupChannel> {
        self.yach_group
            .as_ref()
            .ok_or_else(|| disabled(ChannelKind::YachGroup))
    }

    pub fn ding_worker(&self) -> Result<&DingWorkerChannel> {
        self.ding_worker
            .as_ref()
            .ok_or_else(|| disabled(ChannelKind::DingWorker))
    }

    pub fn yach_worker(&self) -> Result<&YachWorkerChannel> {
        self.yach_worker
            .as_ref()
            .ok_or_else(|| disabled(ChannelKind::YachWorker))
    }

    pub fn sms(&self) -> Result<&SmsChannel> {
        self.sms.as_ref().ok_or_else(|| disabled(ChannelKind::Sms))
    }

    pub fn phone(&self) -> Result<&PhoneChannel> {
        self.phone.as_ref().ok_or_else(|| disabled(ChannelKind::Phone))
    }

    #[cfg(feature = "email")]
    pub fn email(&self) -> Result<&EmailChannel> {
        self.email.as_ref().ok_or_else(|| disabled(ChannelKind::Email))
    }

    /// Information about every enabled channel
    pub fn channels(&self) -> Vec<ChannelInfo> {
        let mut channels: Vec<&dyn NoticeChannel> = Vec::new();
        if let Some(channel) = &self.ding_group {
            channels.push(channel);
        }
        if let Some(channel) = &self.yach_group {
            channels.push(channel);
        }
        if let Some(channel) = &self.ding_worker {
            channels.push(channel);
        }
        if let Some(channel) = &self.yach_worker {
            channels.push(channel);
        }
        if let Some(channel) = &self.sms {
            channels.push(channel);
        }
        if let Some(channel) = &self.phone {
            channels.push(channel);
        }
        #[cfg(feature = "email")]
        if let Some(channel) = &self.email {
            channels.push(channel);
        }
        channels.iter().map(|channel| channel.channel_info()).collect()
    }
}

fn disabled(channel: ChannelKind) -> NoticeError {
    NoticeError::config(format!("channel {} is not enabled", channel))
}
