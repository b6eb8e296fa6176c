//! Email notification channel implementation using SMTP

use super::{ChannelInfo, NoticeChannel};
use crate::config::EmailConfig;
use crate::error::{NoticeError, Result};
use lettre::{
    message::{
        header::{ContentType, Header, HeaderName, HeaderValue},
        Mailbox,
    },
    transport::smtp::{authentication::Credentials, PoolConfig},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use noticer_shared::{ChannelKind, Context};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

const CHANNEL: ChannelKind = ChannelKind::Email;

/// Message priority, sent as the `X-Priority` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Highest = 1,
    High = 2,
    #[default]
    Normal = 3,
    Low = 4,
    Lowest = 5,
}

impl Priority {
    fn label(&self) -> &'static str {
        match self {
            Priority::Highest => "1 (Highest)",
            Priority::High => "2 (High)",
            Priority::Normal => "3 (Normal)",
            Priority::Low => "4 (Low)",
            Priority::Lowest => "5 (Lowest)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct XPriority(Priority);

impl Header for XPriority {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Priority")
    }

    fn parse(s: &str) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let priority = match s.trim().chars().next() {
            Some('1') => Priority::Highest,
            Some('2') => Priority::High,
            Some('3') => Priority::Normal,
            Some('4') => Priority::Low,
            Some('5') => Priority::Lowest,
            _ => return Err(format!("invalid priority: {}", s).into()),
        };
        Ok(XPriority(priority))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.label().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Body {
    Html(String),
    Text(String),
}

/// Email under construction
///
/// Lines added with [`EmailMessage::line`] replace any other body and are
/// joined with CRLF into a plain-text body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailMessage {
    subject: String,
    to: Vec<String>,
    body: Option<Body>,
    lines: Vec<String>,
    priority: Priority,
}

impl EmailMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = subject.into();
        self
    }

    /// Add a recipient, either `user@host` or `Name <user@host>`
    pub fn to<S: Into<String>>(mut self, address: S) -> Self {
        self.to.push(address.into());
        self
    }

    pub fn html<S: Into<String>>(mut self, content: S) -> Self {
        self.body = Some(Body::Html(content.into()));
        self
    }

    pub fn text<S: Into<String>>(mut self, content: S) -> Self {
        self.body = Some(Body::Text(content.into()));
        self
    }

    pub fn line<S: Into<String>>(mut self, content: S) -> Self {
        self.lines.push(content.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    fn context(&self) -> Context {
        let mut context = Context::new();
        context.insert("subject".to_string(), Value::from(self.subject.as_str()));
        context.insert("to".to_string(), Value::from(self.to.clone()));
        context
    }
}

/// Email channel for sending notifications via SMTP
#[derive(Clone)]
pub struct EmailChannel {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_mailbox: Mailbox,
}

impl EmailChannel {
    /// Create a new email channel with the given configuration
    pub fn new(config: &EmailConfig) -> Result<Self> {
        info!("Initializing email channel");

        let from_mailbox = format!("{} <{}>", config.from_name, config.from_address)
            .parse::<Mailbox>()
            .map_err(|e| NoticeError::config(format!("Invalid from email address: {}", e)))?;

        let mut transport_builder = if config.smtp_use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host).map_err(|e| {
                NoticeError::config(format!("Failed to create SMTP relay: {}", e))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };

        transport_builder = transport_builder
            .port(config.smtp_port)
            .pool_config(PoolConfig::new().max_size(10))
            .timeout(Some(Duration::from_secs(config.timeout_seconds)));

        if !config.smtp_username.is_empty() && !config.smtp_password.is_empty() {
            let creds =
                Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());
            transport_builder = transport_builder.credentials(creds);
        }

        Ok(Self {
            config: config.clone(),
            transport: transport_builder.build(),
            from_mailbox,
        })
    }

    /// Build the MIME message for an email
    pub fn build(&self, email: &EmailMessage) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from_mailbox.clone())
            .subject(email.subject.as_str())
            .header(XPriority(email.priority));
        for address in &email.to {
            builder = builder.to(address.parse::<Mailbox>()?);
        }

        let (content_type, body) = if email.lines.is_empty() {
            match &email.body {
                Some(Body::Html(html)) => (ContentType::TEXT_HTML, html.clone()),
                Some(Body::Text(text)) => (ContentType::TEXT_PLAIN, text.clone()),
                None => (ContentType::TEXT_PLAIN, String::new()),
            }
        } else {
            (ContentType::TEXT_PLAIN, email.lines.join("\r\n"))
        };

        Ok(builder.header(content_type).body(body)?)
    }

    pub async fn send(&self, email: &EmailMessage) -> Result<()> {
        let failed = |detail: String| NoticeError::Provider {
            code: CHANNEL.error_base() + 4,
            message: format!("notice by email failed, error: {}", detail),
            context: email.context(),
        };

        let message = self.build(email).map_err(|e| failed(e.to_string()))?;
        match self.transport.send(message).await {
            Ok(_) => {
                info!(subject = %email.subject, recipients = email.to.len(), "Email sent");
                Ok(())
            }
            Err(e) => {
                error!(subject = %email.subject, error = %e, "Failed to send email");
                Err(failed(e.to_string()))
            }
        }
    }
}

impl NoticeChannel for EmailChannel {
    fn channel_info(&self) -> ChannelInfo {
        ChannelInfo {
            kind: CHANNEL,
            description: format!("SMTP email via {}", self.config.smtp_host),
            enabled: self.config.enabled,
            supports_failover: false,
            window_limit: None,
        }
    }
}
