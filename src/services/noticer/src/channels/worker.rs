//! Worker robot channels
//!
//! Worker robots message people directly instead of posting into a group. Each
//! request carries a ticket obtained with the app credentials and cached for a
//! short time.

use super::provider::{errcode, errcode_body, form_fields, provider_error, TicketSource};
use super::{ChannelInfo, NoticeChannel};
use crate::config::WorkerBotConfig;
use crate::error::{NoticeError, Result};
use crate::message::{DingWorkerMessage, MessageEncoder, YachWorkerMessage};
use crate::store::TicketCache;
use noticer_shared::{ChannelKind, Context};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Provider code for "too many messages"
const WORKER_RATE_LIMIT: i64 = 426;

/// People a worker message is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerRecipients {
    Emails(Vec<String>),
    Workcodes(Vec<String>),
}

impl WorkerRecipients {
    fn joined(&self) -> String {
        match self {
            WorkerRecipients::Emails(ids) | WorkerRecipients::Workcodes(ids) => ids.join("|"),
        }
    }

    /// Form fields understood by the DingTalk worker API
    pub fn ding_options(&self) -> Context {
        let field = match self {
            WorkerRecipients::Emails(_) => "emails",
            WorkerRecipients::Workcodes(_) => "workcodes",
        };
        let mut options = Context::new();
        options.insert(field.to_string(), Value::from(self.joined()));
        options
    }

    /// Form fields understood by the Yach worker API
    pub fn yach_options(&self) -> Context {
        let user_type = match self {
            WorkerRecipients::Emails(_) => "email",
            WorkerRecipients::Workcodes(_) => "workcode",
        };
        let mut options = Context::new();
        options.insert("user_type".to_string(), Value::from(user_type));
        options.insert("userid_list".to_string(), Value::from(self.joined()));
        options
    }
}

/// Ticket handling and request plumbing shared by both worker providers
#[derive(Clone)]
struct WorkerBot {
    channel: ChannelKind,
    config: WorkerBotConfig,
    client: Client,
    ticket: TicketSource,
}

impl WorkerBot {
    fn new(
        channel: ChannelKind,
        config: &WorkerBotConfig,
        client: Client,
        cache: Arc<dyn TicketCache>,
    ) -> Self {
        info!("Initializing {} channel", channel);
        let ticket = TicketSource::new(
            cache,
            format!("{}.ticket.{}", channel, config.appid),
            Duration::from_secs(config.ticket_ttl_seconds),
        );
        Self {
            channel,
            config: config.clone(),
            client,
            ticket,
        }
    }

    async fn ticket(&self) -> Result<String> {
        self.ticket.get_or_fetch(|| self.fetch_ticket()).await
    }

    async fn fetch_ticket(&self) -> Result<String> {
        let business = format!("get {} ticket", self.channel);
        let response = self
            .client
            .get(&self.config.uri_get_ticket)
            .query(&[
                ("appid", self.config.appid.as_str()),
                ("appkey", self.config.appkey.as_str()),
            ])
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        let json = errcode_body(self.channel, &business, status, &body)?;
        if errcode(&json) != 0 {
            return Err(provider_error(self.channel, &business, json));
        }
        match json["ticket"].as_str() {
            Some(ticket) if !ticket.is_empty() => Ok(ticket.to_string()),
            _ => Err(provider_error(self.channel, &business, json)),
        }
    }

    async fn notice(&self, mut fields: Context) -> Result<()> {
        let business = format!("notice by {}", self.channel);
        fields.insert("ticket".to_string(), Value::from(self.ticket().await?));

        debug!(channel = %self.channel, "Posting worker message");
        let response = self
            .client
            .post(&self.config.uri_notice)
            .form(&form_fields(&fields))
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        let json = errcode_body(self.channel, &business, status, &body)?;
        match errcode(&json) {
            0 => {
                info!(channel = %self.channel, "Worker message delivered");
                Ok(())
            }
            WORKER_RATE_LIMIT => {
                let mut context = Context::new();
                context.insert("json".to_string(), json);
                Err(NoticeError::RateLimited {
                    code: self.channel.error_base() + 3,
                    message: format!("{} failed, reach frequency limit", business),
                    context,
                })
            }
            _ => Err(provider_error(self.channel, &business, json)),
        }
    }

    fn info(&self, description: &str) -> ChannelInfo {
        ChannelInfo {
            kind: self.channel,
            description: description.to_string(),
            enabled: self.config.enabled,
            supports_failover: false,
            window_limit: None,
        }
    }
}

/// DingTalk worker robot channel
#[derive(Clone)]
pub struct DingWorkerChannel {
    bot: WorkerBot,
}

impl DingWorkerChannel {
    pub fn new(config: &WorkerBotConfig, client: Client, cache: Arc<dyn TicketCache>) -> Self {
        Self {
            bot: WorkerBot::new(ChannelKind::DingWorker, config, client, cache),
        }
    }

    /// Send to the given people
    pub async fn send(&self, message: &DingWorkerMessage, recipients: &WorkerRecipients) -> Result<()> {
        self.send_with_options(message, &recipients.ding_options()).await
    }

    /// Send with raw form options merged over the encoded message
    pub async fn send_with_options(&self, message: &DingWorkerMessage, options: &Context) -> Result<()> {
        let mut fields = match message.encode()? {
            Value::Object(fields) => fields,
            _ => return Err(NoticeError::encode("worker message must encode to an object")),
        };
        for (key, value) in options {
            fields.insert(key.clone(), value.clone());
        }
        self.bot.notice(fields).await
    }

    pub fn ticket_key(&self) -> &str {
        self.bot.ticket.key()
    }
}

impl NoticeChannel for DingWorkerChannel {
    fn channel_info(&self) -> ChannelInfo {
        self.bot.info("DingTalk worker robot direct messages")
    }
}

/// Yach worker robot channel
#[derive(Clone)]
pub struct YachWorkerChannel {
    bot: WorkerBot,
}

impl YachWorkerChannel {
    pub fn new(config: &WorkerBotConfig, client: Client, cache: Arc<dyn TicketCache>) -> Self {
        Self {
            bot: WorkerBot::new(ChannelKind::YachWorker, config, client, cache),
        }
    }

    pub async fn send(&self, message: &YachWorkerMessage, recipients: &WorkerRecipients) -> Result<()> {
        self.send_with_options(message, &recipients.yach_options()).await
    }

    /// Send with raw form options; the encoded message travels in `message`
    pub async fn send_with_options(&self, message: &YachWorkerMessage, options: &Context) -> Result<()> {
        let mut fields = options.clone();
        fields.insert("message".to_string(), message.encode()?);
        self.bot.notice(fields).await
    }

    pub fn ticket_key(&self) -> &str {
        self.bot.ticket.key()
    }
}

impl NoticeChannel for YachWorkerChannel {
    fn channel_info(&self) -> ChannelInfo {
        self.bot.info("Yach worker robot direct messages")
    }
}
