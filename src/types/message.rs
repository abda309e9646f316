//! Assembled UI message

use super::part::UiMessagePart;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    #[default]
    Assistant,
}

/// An ordered sequence of parts plus message-level metadata.
///
/// Part order is first-seen order. `step-start` placeholders are kept in place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub parts: Vec<UiMessagePart>,
}

impl UiMessage {
    pub fn assistant() -> Self {
        Self::default()
    }

    /// Parts excluding step placeholders.
    pub fn content_parts(&self) -> impl Iterator<Item = &UiMessagePart> {
        self.parts
            .iter()
            .filter(|p| !matches!(p, UiMessagePart::StepStart))
    }

    pub fn has_content(&self) -> bool {
        self.content_parts().next().is_some()
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                UiMessagePart::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Shallow-merge `incoming` into the message metadata; incoming keys win.
    pub fn merge_metadata(&mut self, incoming: &Value) {
        match (&mut self.metadata, incoming) {
            (Some(Value::Object(current)), Value::Object(update)) => {
                for (k, v) in update {
                    current.insert(k.clone(), v.clone());
                }
            }
            (slot, _) => *slot = Some(incoming.clone()),
        }
    }
}
