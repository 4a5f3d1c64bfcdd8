use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::VertoRequest;
use crate::message::JsonObject;
use crate::method::Method;

/// One content part of a conversation item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ConversationContent {
    pub fn input_text(text: impl Into<String>) -> Self {
        Self { kind: "input_text".to_string(), text: text.into() }
    }
}

/// A message placed into an AI assistant conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub content: Vec<ConversationContent>,
}

impl ConversationItem {
    /// A user message with a fresh id
    pub fn user_message(content: Vec<ConversationContent>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: "message".to_string(),
            role: "user".to_string(),
            content,
        }
    }
}

/// `ai_conversation` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiConversationRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub item: ConversationItem,
}

impl AiConversationRequest {
    pub const CREATE_ITEM: &'static str = "conversation.item.create";

    /// Send `text` as a user message
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: Self::CREATE_ITEM.to_string(),
            item: ConversationItem::user_message(vec![ConversationContent::input_text(text)]),
        }
    }
}

impl VertoRequest for AiConversationRequest {
    fn method(&self) -> Method {
        Method::AiConversation
    }

    fn params(&self) -> JsonObject {
        match serde_json::to_value(self) {
            Ok(Value::Object(params)) => params,
            _ => JsonObject::new(),
        }
    }
}
