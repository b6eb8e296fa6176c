//! Voice call channel
//!
//! Places a text-to-speech landing call. Requests are signed with the account
//! sid, token and a second-resolution local timestamp.

use super::{ChannelInfo, NoticeChannel};
use crate::config::PhoneConfig;
use crate::error::{NoticeError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Local;
use md5::{Digest, Md5};
use noticer_shared::{ChannelKind, Context};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use tracing::info;

const CHANNEL: ChannelKind = ChannelKind::Phone;

/// Success value of `statusCode`
const STATUS_OK: &str = "000000";

#[derive(Clone)]
pub struct PhoneChannel {
    config: PhoneConfig,
    client: Client,
}

impl PhoneChannel {
    pub fn new(config: &PhoneConfig, client: Client) -> Self {
        info!("Initializing phone channel");
        Self {
            config: config.clone(),
            client,
        }
    }

    pub fn uri_notice(&self) -> String {
        format!(
            "{}Accounts/{}/Calls/LandingCalls/",
            self.config.base_uri, self.config.sid
        )
    }

    /// `sig` query parameter: lowercase hex MD5 of sid, token and timestamp
    pub fn signature(&self, timestamp: &str) -> String {
        let digest = Md5::digest(format!("{}{}{}", self.config.sid, self.config.token, timestamp));
        hex::encode(digest)
    }

    /// `Authorization` header: base64 of `sid:timestamp`
    pub fn authorization(&self, timestamp: &str) -> String {
        BASE64.encode(format!("{}:{}", self.config.sid, timestamp))
    }

    /// Request body: configured options, then call fields, then per-call options
    pub fn body(&self, content: &str, receiver: &str, options: Option<&Context>) -> Value {
        let mut body: Context = self
            .config
            .options
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        body.insert("appId".to_string(), Value::from(self.config.appid.as_str()));
        body.insert("to".to_string(), Value::from(receiver));
        body.insert("mediaTxt".to_string(), Value::from(content));
        if let Some(options) = options {
            for (key, value) in options {
                body.insert(key.clone(), value.clone());
            }
        }
        Value::Object(body)
    }

    /// Call `receiver` and read `content` aloud; returns the provider response
    pub async fn send(&self, content: &str, receiver: &str, options: Option<&Context>) -> Result<Value> {
        let timestamp = Local::now().format("%Y%m%d%H%M%S").to_string();

        let response = self
            .client
            .post(self.uri_notice())
            .query(&[("sig", self.signature(&timestamp))])
            .header(AUTHORIZATION, self.authorization(&timestamp))
            .header(ACCEPT, "application/json")
            .json(&self.body(content, receiver, options))
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if status != 200 {
            let mut context = Context::new();
            context.insert("status_code".to_string(), Value::from(status));
            context.insert("body".to_string(), Value::from(body));
            return Err(NoticeError::Provider {
                code: CHANNEL.error_base() + 1,
                message: "notice by phone failed, status code is not 200".to_string(),
                context,
            });
        }

        let json = match serde_json::from_str::<Value>(&body) {
            Ok(json) if json.get("statusCode").is_some() => json,
            _ => {
                let mut context = Context::new();
                context.insert("body".to_string(), Value::from(body));
                return Err(NoticeError::Provider {
                    code: CHANNEL.error_base() + 2,
                    message: "notice by phone failed, not key statusCode".to_string(),
                    context,
                });
            }
        };

        let status_code = match &json["statusCode"] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if status_code != STATUS_OK {
            let status_msg = json["statusMsg"].as_str().unwrap_or_default().to_string();
            let mut context = Context::new();
            context.insert("json".to_string(), json);
            return Err(NoticeError::Provider {
                code: CHANNEL.error_base() + 4,
                message: format!("notice by phone failed, error: {}", status_msg),
                context,
            });
        }

        info!(receiver, "Voice call placed");
        Ok(json)
    }
}

impl NoticeChannel for PhoneChannel {
    fn channel_info(&self) -> ChannelInfo {
        ChannelInfo {
            kind: CHANNEL,
            description: "Text-to-speech landing calls".to_string(),
            enabled: self.config.enabled,
            supports_failover: false,
            window_limit: None,
        }
    }
}
