//! Yach worker robot messages
//!
//! The whole `{"msgtype": kind, kind: data}` envelope travels base64 encoded in
//! a single `message` form field.

use super::{base64_json, envelope, MessageEncoder, Payload};
use crate::error::Result;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Text {
    pub content: String,
}

impl Text {
    pub fn new<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Markdown {
    pub title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Markdown {
    pub fn new<S1: Into<String>, S2: Into<String>>(title: S1, text: S2) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            image: None,
        }
    }

    pub fn image<S: Into<String>>(mut self, image: S) -> Self {
        let image = image.into();
        self.image = (!image.is_empty()).then_some(image);
        self
    }
}

/// Message accepted by the Yach worker robot channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YachWorkerMessage {
    Text(Text),
    Markdown(Markdown),
}

impl MessageEncoder for YachWorkerMessage {
    fn kind(&self) -> &'static str {
        match self {
            YachWorkerMessage::Text(_) => "text",
            YachWorkerMessage::Markdown(_) => "markdown",
        }
    }

    /// Encodes to a JSON string holding the base64 envelope
    fn encode(&self) -> Result<Payload> {
        let data = match self {
            YachWorkerMessage::Text(text) => serde_json::to_value(text)?,
            YachWorkerMessage::Markdown(markdown) => serde_json::to_value(markdown)?,
        };
        Ok(Value::String(base64_json(&envelope(self.kind(), data))?))
    }
}

impl From<Text> for YachWorkerMessage {
    fn from(message: Text) -> Self {
        YachWorkerMessage::Text(message)
    }
}

impl From<Markdown> for YachWorkerMessage {
    fn from(message: Markdown) -> Self {
        YachWorkerMessage::Markdown(message)
    }
}
