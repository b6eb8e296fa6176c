//! Provider message builders
//!
//! Every provider has a closed set of message kinds. Each kind is a small
//! builder struct; the provider enum wraps them so channels accept exactly the
//! kinds their provider understands. Encoding validates required settings,
//! e.g. an action card without a button mode is rejected before any request.

use crate::error::{NoticeError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use serde_json::{json, Map, Value};

pub mod ding_group;
pub mod ding_worker;
pub mod yach_group;
pub mod yach_worker;

pub use ding_group::DingGroupMessage;
pub use ding_worker::DingWorkerMessage;
pub use yach_group::YachGroupMessage;
pub use yach_worker::YachWorkerMessage;

/// Encoded wire form of a message
pub type Payload = Value;

/// A message that knows its provider discriminant and wire encoding
pub trait MessageEncoder {
    /// Provider discriminant, e.g. `markdown` or `actionCard`
    fn kind(&self) -> &'static str;

    fn encode(&self) -> Result<Payload>;
}

/// Button of an action card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub title: String,
    pub url: String,
}

impl Button {
    pub fn new<S1: Into<String>, S2: Into<String>>(title: S1, url: S2) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// How an action card presents its buttons
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonMode {
    /// One button covering the whole card
    Single(Button),
    /// Independent buttons
    Multiple(Vec<Button>),
}

impl ButtonMode {
    /// Append a button, switching a single-button card to independent buttons
    fn push(mode: &mut Option<ButtonMode>, button: Button) {
        match mode {
            Some(ButtonMode::Multiple(buttons)) => buttons.push(button),
            _ => *mode = Some(ButtonMode::Multiple(vec![button])),
        }
    }

    fn required(mode: &Option<ButtonMode>) -> Result<&ButtonMode> {
        mode.as_ref()
            .ok_or_else(|| NoticeError::encode("action card mode is not set, call single() or btn()"))
    }
}

/// `{"msgtype": kind, kind: data}`, the group robot envelope
fn envelope(kind: &str, data: Value) -> Payload {
    let mut payload = Map::new();
    payload.insert("msgtype".to_string(), Value::from(kind));
    payload.insert(kind.to_string(), data);
    Value::Object(payload)
}

fn to_object<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(NoticeError::encode(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn base64_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(BASE64.encode(serde_json::to_vec(value)?))
}

/// `"0"` or `"1"`, the flag form the robot APIs expect
fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Button fields in the snake_case form used by Yach and the DingTalk worker API
fn snake_buttons(
    data: &mut Map<String, Value>,
    mode: &Option<ButtonMode>,
    vertical: bool,
) -> Result<()> {
    match ButtonMode::required(mode)? {
        ButtonMode::Single(button) => {
            data.insert("single_title".to_string(), Value::from(button.title.as_str()));
            data.insert("single_url".to_string(), Value::from(button.url.as_str()));
        }
        ButtonMode::Multiple(buttons) => {
            let buttons = buttons
                .iter()
                .map(|b| json!({ "title": b.title, "action_url": b.url }))
                .collect();
            data.insert("btn_json_list".to_string(), Value::Array(buttons));
            data.insert("btn_orientation".to_string(), Value::from(flag(!vertical)));
        }
    }
    Ok(())
}
