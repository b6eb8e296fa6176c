//! DingTalk worker robot messages
//!
//! The worker API takes form fields: `type` names the kind and `content`
//! carries the body base64 encoded. Plain text is encoded as-is, structured
//! bodies as JSON.

use super::{base64_json, snake_buttons, Button, ButtonMode, MessageEncoder, Payload};
use crate::error::{NoticeError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
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
}

impl Markdown {
    pub fn new<S1: Into<String>, S2: Into<String>>(title: S1, text: S2) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub title: String,
    pub text: String,
    pub pic_url: String,
    pub message_url: String,
}

impl Link {
    pub fn new<S1, S2, S3, S4>(title: S1, text: S2, message_url: S3, pic_url: S4) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
    {
        Self {
            title: title.into(),
            text: text.into(),
            pic_url: pic_url.into(),
            message_url: message_url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCard {
    pub title: String,
    pub markdown: String,
    mode: Option<ButtonMode>,
    vertical: bool,
}

impl ActionCard {
    pub fn new<S1: Into<String>, S2: Into<String>>(title: S1, markdown: S2) -> Self {
        Self {
            title: title.into(),
            markdown: markdown.into(),
            mode: None,
            vertical: false,
        }
    }

    pub fn single<S1: Into<String>, S2: Into<String>>(mut self, title: S1, url: S2) -> Self {
        self.mode = Some(ButtonMode::Single(Button::new(title, url)));
        self
    }

    pub fn btn<S1: Into<String>, S2: Into<String>>(mut self, title: S1, url: S2) -> Self {
        ButtonMode::push(&mut self.mode, Button::new(title, url));
        self
    }

    pub fn btns(mut self, buttons: Vec<Button>) -> Self {
        self.mode = Some(ButtonMode::Multiple(buttons));
        self
    }

    pub fn vertical(mut self, vertical: bool) -> Self {
        self.vertical = vertical;
        self
    }
}

/// Image already uploaded to the media service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub media_url: String,
}

impl Image {
    pub fn new<S: Into<String>>(media_url: S) -> Self {
        Self {
            media_url: media_url.into(),
        }
    }
}

/// Voice clip already uploaded to the media service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub media_url: String,
    /// Length in seconds
    pub duration: u32,
}

impl Voice {
    pub fn new<S: Into<String>>(media_url: S, duration: u32) -> Self {
        Self {
            media_url: media_url.into(),
            duration,
        }
    }
}

/// Message accepted by the DingTalk worker robot channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DingWorkerMessage {
    Text(Text),
    Markdown(Markdown),
    Link(Link),
    ActionCard(ActionCard),
    Image(Image),
    Voice(Voice),
}

impl MessageEncoder for DingWorkerMessage {
    fn kind(&self) -> &'static str {
        match self {
            DingWorkerMessage::Text(_) => "text",
            DingWorkerMessage::Markdown(_) => "markdown",
            DingWorkerMessage::Link(_) => "link",
            DingWorkerMessage::ActionCard(_) => "action_card",
            DingWorkerMessage::Image(_) => "image",
            DingWorkerMessage::Voice(_) => "voice",
        }
    }

    fn encode(&self) -> Result<Payload> {
        let kind = self.kind();
        let payload = match self {
            DingWorkerMessage::Text(text) => {
                json!({ "type": kind, "content": BASE64.encode(&text.content) })
            }
            DingWorkerMessage::Markdown(markdown) => {
                json!({ "type": kind, "content": base64_json(markdown)? })
            }
            DingWorkerMessage::Link(link) => {
                json!({ "type": kind, "content": base64_json(link)? })
            }
            DingWorkerMessage::ActionCard(card) => {
                let mut data = Map::new();
                data.insert("title".to_string(), Value::from(card.title.as_str()));
                data.insert("markdown".to_string(), Value::from(card.markdown.as_str()));
                snake_buttons(&mut data, &card.mode, card.vertical)?;
                json!({ "type": kind, "content": base64_json(&data)? })
            }
            DingWorkerMessage::Image(image) => {
                json!({ "type": kind, "media_url": image.media_url })
            }
            DingWorkerMessage::Voice(voice) => {
                if voice.duration == 0 {
                    return Err(NoticeError::encode("voice duration must be at least 1 second"));
                }
                json!({
                    "type": kind,
                    "media_url": voice.media_url,
                    "content": base64_json(&json!({ "duration": voice.duration }))?,
                })
            }
        };
        Ok(payload)
    }
}

impl From<Text> for DingWorkerMessage {
    fn from(message: Text) -> Self {
        DingWorkerMessage::Text(message)
    }
}

impl From<Markdown> for DingWorkerMessage {
    fn from(message: Markdown) -> Self {
        DingWorkerMessage::Markdown(message)
    }
}

impl From<Link> for DingWorkerMessage {
    fn from(message: Link) -> Self {
        DingWorkerMessage::Link(message)
    }
}

impl From<ActionCard> for DingWorkerMessage {
    fn from(message: ActionCard) -> Self {
        DingWorkerMessage::ActionCard(message)
    }
}

impl From<Image> for DingWorkerMessage {
    fn from(message: Image) -> Self {
        DingWorkerMessage::Image(message)
    }
}

impl From<Voice> for DingWorkerMessage {
    fn from(message: Voice) -> Self {
        DingWorkerMessage::Voice(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode_content(payload: &Payload) -> Vec<u8> {
        BASE64
            .decode(payload["content"].as_str().unwrap())
            .unwrap()
    }

    #[test]
    fn test_text_content_is_plain_base64() {
        let payload = DingWorkerMessage::from(Text::new("hello")).encode().unwrap();
        assert_eq!(payload["type"], "text");
        assert_eq!(decode_content(&payload), b"hello");
    }

    #[test]
    fn test_link_content_is_json() {
        let payload = DingWorkerMessage::from(Link::new("t", "body", "https://m", "https://p.png"))
            .encode()
            .unwrap();
        let content: Value = serde_json::from_slice(&decode_content(&payload)).unwrap();
        assert_eq!(
            content,
            json!({"title": "t", "text": "body", "picUrl": "https://p.png", "messageUrl": "https://m"})
        );
    }

    #[test]
    fn test_action_card_content() {
        let payload = DingWorkerMessage::from(ActionCard::new("t", "md").single("Go", "https://g"))
            .encode()
            .unwrap();
        assert_eq!(payload["type"], "action_card");
        let content: Value = serde_json::from_slice(&decode_content(&payload)).unwrap();
        assert_eq!(
            content,
            json!({"title": "t", "markdown": "md", "single_title": "Go", "single_url": "https://g"})
        );

        assert!(DingWorkerMessage::from(ActionCard::new("t", "md"))
            .encode()
            .is_err());
    }

    #[test]
    fn test_image_and_voice() {
        let payload = DingWorkerMessage::from(Image::new("@lADOxyz")).encode().unwrap();
        assert_eq!(payload, json!({"type": "image", "media_url": "@lADOxyz"}));

        let payload = DingWorkerMessage::from(Voice::new("@voice", 12)).encode().unwrap();
        assert_eq!(payload["media_url"], "@voice");
        let content: Value = serde_json::from_slice(&decode_content(&payload)).unwrap();
        assert_eq!(content, json!({"duration": 12}));

        assert!(DingWorkerMessage::from(Voice::new("@voice", 0))
            .encode()
            .is_err());
    }
}
