//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use noticer::{
    CooldownGate, CounterStore, Endpoint, EndpointTransport, MemoryStore, MessageEncoder,
    NoticeError, Payload, Result, TransportResponse,
};
use noticer::config::CooldownConfig;
use noticer::ChannelKind;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scripted answer of one endpoint
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16, &'static str),
    Raw(&'static str),
    Unreachable,
}

impl Reply {
    pub fn ding_ok() -> Self {
        Reply::Json(json!({"errcode": 0, "errmsg": "ok"}))
    }

    pub fn ding_error(errcode: i64, errmsg: &str) -> Self {
        Reply::Json(json!({"errcode": errcode, "errmsg": errmsg}))
    }
}

/// Transport answering from a script and recording every call
pub struct ScriptedTransport {
    replies: HashMap<String, Reply>,
    default: Reply,
    calls: Mutex<Vec<(String, Payload)>>,
}

impl ScriptedTransport {
    pub fn new(default: Reply) -> Self {
        Self {
            replies: HashMap::new(),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(mut self, identifier: &str, reply: Reply) -> Self {
        self.replies.insert(identifier.to_string(), reply);
        self
    }

    /// Identifiers in call order
    pub fn called(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn calls_to(&self, identifier: &str) -> usize {
        self.calls.lock().iter().filter(|(id, _)| id == identifier).count()
    }

    pub fn payloads(&self) -> Vec<Payload> {
        self.calls.lock().iter().map(|(_, payload)| payload.clone()).collect()
    }
}

#[async_trait]
impl EndpointTransport for ScriptedTransport {
    async fn call(&self, endpoint: &Endpoint, payload: &Payload) -> Result<TransportResponse> {
        self.calls
            .lock()
            .push((endpoint.identifier().to_string(), payload.clone()));

        let reply = self
            .replies
            .get(endpoint.identifier())
            .unwrap_or(&self.default);
        match reply {
            Reply::Json(body) => Ok(TransportResponse::json_ok(body)),
            Reply::Status(status, body) => Ok(TransportResponse::new(*status, *body)),
            Reply::Raw(body) => Ok(TransportResponse::new(200, *body)),
            Reply::Unreachable => Err(NoticeError::transport("connection refused")),
        }
    }
}

/// Text message that counts how often it is encoded
#[derive(Default)]
pub struct CountingMessage {
    encodes: AtomicUsize,
}

impl CountingMessage {
    pub fn encodes(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }
}

impl MessageEncoder for CountingMessage {
    fn kind(&self) -> &'static str {
        "text"
    }

    fn encode(&self) -> Result<Payload> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"msgtype": "text", "text": {"content": "disk full"}}))
    }
}

/// Message whose encoding always fails
pub struct BrokenMessage;

impl MessageEncoder for BrokenMessage {
    fn kind(&self) -> &'static str {
        "actionCard"
    }

    fn encode(&self) -> Result<Payload> {
        Err(NoticeError::encode("action card mode is not set"))
    }
}

pub fn cooldown(limit: u64, window_seconds: u64) -> CooldownConfig {
    CooldownConfig {
        key_prefix: "dog.dinggroup.sleep.".to_string(),
        window_limit: limit,
        window_seconds,
    }
}

pub fn ding_gate(store: Arc<MemoryStore>, config: CooldownConfig) -> CooldownGate {
    let store: Arc<dyn CounterStore> = store;
    CooldownGate::new(store, config, ChannelKind::DingGroup)
}

pub fn endpoints(identifiers: &[&str]) -> Vec<Endpoint> {
    identifiers.iter().map(|id| Endpoint::new(*id)).collect()
}
