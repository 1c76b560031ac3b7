use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameMessageType {
    UserMessage,
    ShowWaiting,
    HideWaiting,
    BotMessage,
}

/// Message posted to the embedded chat display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMessage {
    #[serde(rename = "type")]
    pub kind: FrameMessageType,
    pub message: String,
}

impl FrameMessage {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            kind: FrameMessageType::UserMessage,
            message: message.into(),
        }
    }

    pub fn bot(message: impl Into<String>) -> Self {
        Self {
            kind: FrameMessageType::BotMessage,
            message: message.into(),
        }
    }

    pub fn show_waiting() -> Self {
        Self {
            kind: FrameMessageType::ShowWaiting,
            message: String::new(),
        }
    }

    pub fn hide_waiting() -> Self {
        Self {
            kind: FrameMessageType::HideWaiting,
            message: String::new(),
        }
    }
}
