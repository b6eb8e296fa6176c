//! Yach group robot messages

use super::{envelope, snake_buttons, Button, ButtonMode, MessageEncoder, Payload};
use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Value};

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
        self.image = non_empty(image.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCard {
    pub title: String,
    pub markdown: String,
    pub image: Option<String>,
    pub content_title: Option<String>,
    mode: Option<ButtonMode>,
    vertical: bool,
}

impl ActionCard {
    pub fn new<S1: Into<String>, S2: Into<String>>(title: S1, markdown: S2) -> Self {
        Self {
            title: title.into(),
            markdown: markdown.into(),
            image: None,
            content_title: None,
            mode: None,
            vertical: false,
        }
    }

    pub fn image<S: Into<String>>(mut self, image: S) -> Self {
        self.image = non_empty(image.into());
        self
    }

    pub fn content_title<S: Into<String>>(mut self, content_title: S) -> Self {
        self.content_title = non_empty(content_title.into());
        self
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

    fn data(&self) -> Result<Map<String, Value>> {
        let mut data = Map::new();
        data.insert("title".to_string(), Value::from(self.title.as_str()));
        data.insert("markdown".to_string(), Value::from(self.markdown.as_str()));
        if let Some(image) = &self.image {
            data.insert("image".to_string(), Value::from(image.as_str()));
        }
        if let Some(content_title) = &self.content_title {
            data.insert("content_title".to_string(), Value::from(content_title.as_str()));
        }
        snake_buttons(&mut data, &self.mode, self.vertical)?;
        Ok(data)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Message accepted by the Yach group robot channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YachGroupMessage {
    Text(Text),
    Markdown(Markdown),
    ActionCard(ActionCard),
}

impl MessageEncoder for YachGroupMessage {
    fn kind(&self) -> &'static str {
        match self {
            YachGroupMessage::Text(_) => "text",
            YachGroupMessage::Markdown(_) => "markdown",
            YachGroupMessage::ActionCard(_) => "action_card",
        }
    }

    fn encode(&self) -> Result<Payload> {
        let data = match self {
            YachGroupMessage::Text(text) => serde_json::to_value(text)?,
            YachGroupMessage::Markdown(markdown) => serde_json::to_value(markdown)?,
            YachGroupMessage::ActionCard(card) => Value::Object(card.data()?),
        };
        Ok(envelope(self.kind(), data))
    }
}

impl From<Text> for YachGroupMessage {
    fn from(message: Text) -> Self {
        YachGroupMessage::Text(message)
    }
}

impl From<Markdown> for YachGroupMessage {
    fn from(message: Markdown) -> Self {
        YachGroupMessage::Markdown(message)
    }
}

impl From<ActionCard> for YachGroupMessage {
    fn from(message: ActionCard) -> Self {
        YachGroupMessage::ActionCard(message)
    }
}
