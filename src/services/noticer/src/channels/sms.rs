//! SMS gateway channel implementation

use super::provider::{errcode, errcode_body, provider_error, TicketSource};
use super::{ChannelInfo, NoticeChannel};
use crate::config::SmsConfig;
use crate::error::Result;
use crate::store::TicketCache;
use noticer_shared::ChannelKind;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const CHANNEL: ChannelKind = ChannelKind::Sms;

/// One templated message in a send request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmsRecipient<'a> {
    pub phone_code: u32,
    pub phone: &'a str,
    pub sms_param: &'a Value,
}

/// Channel sending templated SMS through the gateway
#[derive(Clone)]
pub struct SmsChannel {
    config: SmsConfig,
    client: Client,
    ticket: TicketSource,
}

impl SmsChannel {
    pub fn new(config: &SmsConfig, client: Client, cache: Arc<dyn TicketCache>) -> Self {
        info!("Initializing SMS channel");
        let ticket = TicketSource::new(
            cache,
            format!("sms.ticket.{}", config.appid),
            Duration::from_secs(config.ticket_ttl_seconds),
        );
        Self {
            config: config.clone(),
            client,
            ticket,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_uri.trim_end_matches('/'), path)
    }

    /// Form fields of a send request
    pub fn form(&self, template_id: &str, params: &Value, receivers: &[String]) -> Result<Vec<(String, String)>> {
        let msgs: Vec<SmsRecipient<'_>> = receivers
            .iter()
            .map(|phone| SmsRecipient {
                phone_code: self.config.phone_code,
                phone,
                sms_param: params,
            })
            .collect();

        Ok(vec![
            ("type".to_string(), "1".to_string()),
            ("msgs".to_string(), serde_json::to_string(&msgs)?),
            ("tpl_id".to_string(), template_id.to_string()),
        ])
    }

    /// Send template `template_id` filled with `params` to every receiver
    pub async fn send(&self, template_id: &str, params: &Value, receivers: &[String]) -> Result<()> {
        let business = "notice by sms";
        let form = self.form(template_id, params, receivers)?;
        let ticket = self.ticket.get_or_fetch(|| self.fetch_ticket()).await?;

        let response = self
            .client
            .post(self.url("/v1/sms/send"))
            .query(&[("ticket", ticket.as_str())])
            .form(&form)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        let json = errcode_body(CHANNEL, business, status, &body)?;
        if errcode(&json) != 0 {
            return Err(provider_error(CHANNEL, business, json));
        }

        info!(template_id, receivers = receivers.len(), "SMS sent");
        Ok(())
    }

    async fn fetch_ticket(&self) -> Result<String> {
        let business = "get sms ticket";
        let response = self
            .client
            .get(self.url("/v1/ticket/get"))
            .query(&[
                ("appid", self.config.appid.as_str()),
                ("secret", self.config.secret.as_str()),
            ])
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        let json = errcode_body(CHANNEL, business, status, &body)?;
        if errcode(&json) != 0 {
            return Err(provider_error(CHANNEL, business, json));
        }
        match json["data"]["ticket"].as_str() {
            Some(ticket) if !ticket.is_empty() => Ok(ticket.to_string()),
            _ => Err(provider_error(CHANNEL, business, json)),
        }
    }
}

impl NoticeChannel for SmsChannel {
    fn channel_info(&self) -> ChannelInfo {
        ChannelInfo {
            kind: CHANNEL,
            description: "Templated SMS via the SMS gateway".to_string(),
            enabled: self.config.enabled,
            supports_failover: false,
            window_limit: None,
        }
    }
}
