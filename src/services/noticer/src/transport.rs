//! Endpoint transport
//!
//! The dispatcher only sees a normalized `{status, body}` pair. Building the
//! request, signing it and reading the body all happen behind
//! [`EndpointTransport`], so tests can script responses without a network.

use crate::error::{NoticeError, Result};
use crate::message::Payload;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use noticer_shared::{Endpoint, HttpClientConfig};
use reqwest::Client;
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{debug, info};

/// Raw provider answer
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
    /// Query parameters the request was sent with, for failure context
    pub query: Option<Value>,
}

impl TransportResponse {
    pub fn new<B: Into<Bytes>>(status: u16, body: B) -> Self {
        Self {
            status,
            body: body.into(),
            query: None,
        }
    }

    /// Build a 200 response from a JSON value
    pub fn json_ok(body: &Value) -> Self {
        Self::new(200, body.to_string())
    }

    /// Body parsed as JSON, `None` when it is not valid JSON
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body for failure context: JSON when it parses, text otherwise
    pub fn body_value(&self) -> Value {
        self.json().unwrap_or_else(|| Value::String(self.text()))
    }
}

/// Sends one encoded payload to one endpoint
#[async_trait]
pub trait EndpointTransport: Send + Sync {
    /// Errors mean no interpretable response was received
    async fn call(&self, endpoint: &Endpoint, payload: &Payload) -> Result<TransportResponse>;
}

#[async_trait]
impl<T: EndpointTransport + ?Sized> EndpointTransport for Arc<T> {
    async fn call(&self, endpoint: &Endpoint, payload: &Payload) -> Result<TransportResponse> {
        (**self).call(endpoint, payload).await
    }
}

/// Build the HTTP client shared by the HTTP channels
pub fn build_http_client(config: &HttpClientConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .user_agent(&config.user_agent)
        .danger_accept_invalid_certs(!config.verify_ssl)
        .build()
        .map_err(|e| NoticeError::config(format!("Failed to create HTTP client: {}", e)))
}

/// Signature of a robot request: base64 of HMAC-SHA256 over `"{timestamp}\n{secret}"`
pub fn sign(secret: &str, timestamp_ms: i64) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| NoticeError::encode("Invalid HMAC key"))?;
    mac.update(format!("{}\n{}", timestamp_ms, secret).as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Group robot webhook transport
///
/// Posts the payload as JSON to `uri_push?access_token={identifier}`, adding
/// `timestamp` and `sign` when the endpoint carries a secret.
#[derive(Clone)]
pub struct RobotHttpTransport {
    client: Client,
    uri_push: String,
}

impl RobotHttpTransport {
    pub fn new<S: Into<String>>(client: Client, uri_push: S) -> Self {
        let uri_push = uri_push.into();
        info!("Robot transport targeting {}", uri_push);
        Self { client, uri_push }
    }

    pub fn from_config<S: Into<String>>(config: &HttpClientConfig, uri_push: S) -> Result<Self> {
        Ok(Self::new(build_http_client(config)?, uri_push))
    }

    fn query(&self, endpoint: &Endpoint) -> Result<Vec<(&'static str, String)>> {
        let mut query = vec![("access_token", endpoint.identifier().to_string())];
        if let Some(secret) = endpoint.secret() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            query.push(("timestamp", timestamp.to_string()));
            query.push(("sign", sign(secret, timestamp)?));
        }
        Ok(query)
    }
}

#[async_trait]
impl EndpointTransport for RobotHttpTransport {
    async fn call(&self, endpoint: &Endpoint, payload: &Payload) -> Result<TransportResponse> {
        let query = self.query(endpoint)?;
        debug!(endpoint = %endpoint, "Posting robot message");

        let response = self
            .client
            .post(&self.uri_push)
            .query(&query)
            .json(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;

        let query = query
            .into_iter()
            .filter(|(name, _)| *name != "sign")
            .map(|(name, value)| (name.to_string(), Value::String(value)))
            .collect();

        Ok(TransportResponse {
            status,
            body,
            query: Some(Value::Object(query)),
        })
    }
}
