//! DingTalk group robot messages

use super::{envelope, flag, to_object, Button, ButtonMode, MessageEncoder, Payload};
use crate::error::{NoticeError, Result};
use serde::Serialize;
use serde_json::{json, Value};

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
    pub message_url: String,
    pub pic_url: String,
}

impl Link {
    pub fn new<S1, S2, S3>(title: S1, text: S2, message_url: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            title: title.into(),
            text: text.into(),
            message_url: message_url.into(),
            pic_url: String::new(),
        }
    }

    pub fn pic_url<S: Into<String>>(mut self, pic_url: S) -> Self {
        self.pic_url = pic_url.into();
        self
    }
}

/// Card with a markdown body and one or more buttons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCard {
    pub title: String,
    pub text: String,
    mode: Option<ButtonMode>,
    vertical: bool,
    hide_avatar: bool,
}

impl ActionCard {
    pub fn new<S1: Into<String>, S2: Into<String>>(title: S1, markdown: S2) -> Self {
        Self {
            title: title.into(),
            text: markdown.into(),
            mode: None,
            vertical: false,
            hide_avatar: false,
        }
    }

    /// Use one button for the whole card
    pub fn single<S1: Into<String>, S2: Into<String>>(mut self, title: S1, url: S2) -> Self {
        self.mode = Some(ButtonMode::Single(Button::new(title, url)));
        self
    }

    /// Append an independent button
    pub fn btn<S1: Into<String>, S2: Into<String>>(mut self, title: S1, url: S2) -> Self {
        ButtonMode::push(&mut self.mode, Button::new(title, url));
        self
    }

    /// Replace all independent buttons
    pub fn btns(mut self, buttons: Vec<Button>) -> Self {
        self.mode = Some(ButtonMode::Multiple(buttons));
        self
    }

    pub fn vertical(mut self, vertical: bool) -> Self {
        self.vertical = vertical;
        self
    }

    pub fn hide_avatar(mut self, hide: bool) -> Self {
        self.hide_avatar = hide;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedLink {
    pub title: String,
    #[serde(rename = "messageURL")]
    pub message_url: String,
    #[serde(rename = "picURL")]
    pub pic_url: String,
}

/// List of linked entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedCard {
    pub links: Vec<FeedLink>,
}

impl FeedCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link<S1, S2, S3>(mut self, title: S1, message_url: S2, pic_url: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        self.links.push(FeedLink {
            title: title.into(),
            message_url: message_url.into(),
            pic_url: pic_url.into(),
        });
        self
    }
}

/// Message accepted by the DingTalk group robot channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DingGroupMessage {
    Text(Text),
    Markdown(Markdown),
    Link(Link),
    ActionCard(ActionCard),
    FeedCard(FeedCard),
}

impl MessageEncoder for DingGroupMessage {
    fn kind(&self) -> &'static str {
        match self {
            DingGroupMessage::Text(_) => "text",
            DingGroupMessage::Markdown(_) => "markdown",
            DingGroupMessage::Link(_) => "link",
            DingGroupMessage::ActionCard(_) => "actionCard",
            DingGroupMessage::FeedCard(_) => "feedCard",
        }
    }

    fn encode(&self) -> Result<Payload> {
        let data = match self {
            DingGroupMessage::Text(text) => serde_json::to_value(text)?,
            DingGroupMessage::Markdown(markdown) => serde_json::to_value(markdown)?,
            DingGroupMessage::Link(link) => serde_json::to_value(link)?,
            DingGroupMessage::ActionCard(card) => {
                let mut data = to_object(&json!({ "title": card.title, "text": card.text }))?;
                match ButtonMode::required(&card.mode)? {
                    ButtonMode::Single(button) => {
                        data.insert("singleTitle".to_string(), Value::from(button.title.as_str()));
                        data.insert("singleURL".to_string(), Value::from(button.url.as_str()));
                    }
                    ButtonMode::Multiple(buttons) => {
                        let buttons = buttons
                            .iter()
                            .map(|b| json!({ "title": b.title, "actionURL": b.url }))
                            .collect();
                        data.insert("btns".to_string(), Value::Array(buttons));
                    }
                }
                data.insert("hideAvatar".to_string(), Value::from(flag(card.hide_avatar)));
                data.insert("btnOrientation".to_string(), Value::from(flag(!card.vertical)));
                Value::Object(data)
            }
            DingGroupMessage::FeedCard(feed) => {
                if feed.links.is_empty() {
                    return Err(NoticeError::encode("feed card has no link, call link()"));
                }
                serde_json::to_value(feed)?
            }
        };

        Ok(envelope(self.kind(), data))
    }
}

impl From<Text> for DingGroupMessage {
    fn from(message: Text) -> Self {
        DingGroupMessage::Text(message)
    }
}

impl From<Markdown> for DingGroupMessage {
    fn from(message: Markdown) -> Self {
        DingGroupMessage::Markdown(message)
    }
}

impl From<Link> for DingGroupMessage {
    fn from(message: Link) -> Self {
        DingGroupMessage::Link(message)
    }
}

impl From<ActionCard> for DingGroupMessage {
    fn from(message: ActionCard) -> Self {
        DingGroupMessage::ActionCard(message)
    }
}

impl From<FeedCard> for DingGroupMessage {
    fn from(message: FeedCard) -> Self {
        DingGroupMessage::FeedCard(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encode<M: Into<DingGroupMessage>>(message: M) -> Result<Payload> {
        message.into().encode()
    }

    #[test]
    fn test_text_and_markdown() {
        assert_eq!(
            encode(Text::new("disk full")).unwrap(),
            json!({"msgtype": "text", "text": {"content": "disk full"}})
        );
        assert_eq!(
            encode(Markdown::new("Alert", "## disk full")).unwrap(),
            json!({"msgtype": "markdown", "markdown": {"title": "Alert", "text": "## disk full"}})
        );
    }

    #[test]
    fn test_link_defaults_pic_url() {
        assert_eq!(
            encode(Link::new("t", "body", "https://example.com")).unwrap(),
            json!({
                "msgtype": "link",
                "link": {
                    "title": "t",
                    "text": "body",
                    "messageUrl": "https://example.com",
                    "picUrl": ""
                }
            })
        );
    }

    #[test]
    fn test_action_card_single() {
        let card = ActionCard::new("t", "md").single("Open", "https://example.com");
        assert_eq!(
            encode(card).unwrap(),
            json!({
                "msgtype": "actionCard",
                "actionCard": {
                    "title": "t",
                    "text": "md",
                    "singleTitle": "Open",
                    "singleURL": "https://example.com",
                    "hideAvatar": "0",
                    "btnOrientation": "1"
                }
            })
        );
    }

    #[test]
    fn test_action_card_buttons() {
        let card = ActionCard::new("t", "md")
            .btn("Yes", "https://y")
            .btn("No", "https://n")
            .vertical(true)
            .hide_avatar(true);
        let payload = encode(card).unwrap();
        let data = &payload["actionCard"];

        assert_eq!(
            data["btns"],
            json!([
                {"title": "Yes", "actionURL": "https://y"},
                {"title": "No", "actionURL": "https://n"}
            ])
        );
        assert_eq!(data["hideAvatar"], "1");
        assert_eq!(data["btnOrientation"], "0");
        assert!(data.get("singleTitle").is_none());
    }

    #[test]
    fn test_action_card_requires_mode() {
        let err = encode(ActionCard::new("t", "md")).unwrap_err();
        assert!(matches!(err, NoticeError::Encode { .. }));
    }

    #[test]
    fn test_feed_card() {
        assert!(encode(FeedCard::new()).is_err());

        let feed = FeedCard::new().link("a", "https://a", "https://a.png");
        assert_eq!(
            encode(feed).unwrap(),
            json!({
                "msgtype": "feedCard",
                "feedCard": {"links": [
                    {"title": "a", "messageURL": "https://a", "picURL": "https://a.png"}
                ]}
            })
        );
    }
}
