//! UI message stream events
//!
//! Every event is a JSON object `{ "type": ..., ...fields }`. Known kinds map onto a
//! closed set of variants; the open `data-<kind>` family and unrecognized tags are
//! carried by the two trailing untagged variants so nothing is lost in transit.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One incremental unit of a UI message stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum UiStreamEvent {
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_metadata: Option<Value>,
    },
    Finish {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_metadata: Option<Value>,
    },
    Abort,
    MessageMetadata {
        message_metadata: Value,
    },
    Error {
        error_text: String,
    },

    StartStep,
    FinishStep,

    TextStart {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<Value>,
    },
    TextDelta {
        id: String,
        delta: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<Value>,
    },
    TextEnd {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<Value>,
    },
    ReasoningStart {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<Value>,
    },
    ReasoningDelta {
        id: String,
        delta: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<Value>,
    },
    ReasoningEnd {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<Value>,
    },

    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dynamic: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_executed: Option<bool>,
    },
    ToolInputDelta {
        tool_call_id: String,
        input_text_delta: String,
    },
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dynamic: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_executed: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<Value>,
    },
    ToolInputError {
        tool_call_id: String,
        tool_name: String,
        input: Value,
        error_text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dynamic: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_executed: Option<bool>,
    },
    ToolOutputAvailable {
        tool_call_id: String,
        output: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dynamic: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_executed: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preliminary: Option<bool>,
    },
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dynamic: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_executed: Option<bool>,
    },
    ToolOutputDenied {
        tool_call_id: String,
    },
    ToolApprovalRequest {
        tool_call_id: String,
        approval_id: String,
    },

    SourceUrl {
        source_id: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<Value>,
    },
    SourceDocument {
        source_id: String,
        media_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<Value>,
    },
    File {
        media_type: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<Value>,
    },

    /// `data-<kind>` events
    #[serde(untagged)]
    Data(DataEvent),

    /// Anything with a `type` tag this crate does not model. Forwarded untouched.
    #[serde(untagged)]
    Unknown(Value),
}

/// Coarse classification used by the assembler and every operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// No owning part: start, finish, abort, message-metadata, error.
    Meta,
    /// start-step / finish-step.
    Step,
    /// Text and reasoning start/delta/end, addressed by `id`.
    Streamed,
    /// Tool-call lifecycle events, addressed by `toolCallId`.
    Tool,
    /// Single-event parts: file, sources, data.
    Atomic,
    Unknown,
}

impl UiStreamEvent {
    pub fn category(&self) -> EventCategory {
        use UiStreamEvent::*;
        match self {
            Start { .. } | Finish { .. } | Abort | MessageMetadata { .. } | Error { .. } => {
                EventCategory::Meta
            }
            StartStep | FinishStep => EventCategory::Step,
            TextStart { .. }
            | TextDelta { .. }
            | TextEnd { .. }
            | ReasoningStart { .. }
            | ReasoningDelta { .. }
            | ReasoningEnd { .. } => EventCategory::Streamed,
            ToolInputStart { .. }
            | ToolInputDelta { .. }
            | ToolInputAvailable { .. }
            | ToolInputError { .. }
            | ToolOutputAvailable { .. }
            | ToolOutputError { .. }
            | ToolOutputDenied { .. }
            | ToolApprovalRequest { .. } => EventCategory::Tool,
            SourceUrl { .. } | SourceDocument { .. } | File { .. } | Data(_) => {
                EventCategory::Atomic
            }
            Unknown(_) => EventCategory::Unknown,
        }
    }

    /// Whether this event belongs to a part (streamed, tool or atomic).
    pub fn is_content(&self) -> bool {
        matches!(
            self.category(),
            EventCategory::Streamed | EventCategory::Tool | EventCategory::Atomic
        )
    }

    /// The wire `type` tag of this event.
    pub fn event_type(&self) -> String {
        use UiStreamEvent::*;
        let tag = match self {
            Start { .. } => "start",
            Finish { .. } => "finish",
            Abort => "abort",
            MessageMetadata { .. } => "message-metadata",
            Error { .. } => "error",
            StartStep => "start-step",
            FinishStep => "finish-step",
            TextStart { .. } => "text-start",
            TextDelta { .. } => "text-delta",
            TextEnd { .. } => "text-end",
            ReasoningStart { .. } => "reasoning-start",
            ReasoningDelta { .. } => "reasoning-delta",
            ReasoningEnd { .. } => "reasoning-end",
            ToolInputStart { .. } => "tool-input-start",
            ToolInputDelta { .. } => "tool-input-delta",
            ToolInputAvailable { .. } => "tool-input-available",
            ToolInputError { .. } => "tool-input-error",
            ToolOutputAvailable { .. } => "tool-output-available",
            ToolOutputError { .. } => "tool-output-error",
            ToolOutputDenied { .. } => "tool-output-denied",
            ToolApprovalRequest { .. } => "tool-approval-request",
            SourceUrl { .. } => "source-url",
            SourceDocument { .. } => "source-document",
            File { .. } => "file",
            Data(data) => return data.event_type(),
            Unknown(value) => {
                return value
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            }
        };
        tag.to_string()
    }

    /// The streamed-part id (`text-*`, `reasoning-*`).
    pub fn stream_id(&self) -> Option<&str> {
        use UiStreamEvent::*;
        match self {
            TextStart { id, .. }
            | TextDelta { id, .. }
            | TextEnd { id, .. }
            | ReasoningStart { id, .. }
            | ReasoningDelta { id, .. }
            | ReasoningEnd { id, .. } => Some(id),
            _ => None,
        }
    }

    /// The tool call id of a tool-call event.
    pub fn tool_call_id(&self) -> Option<&str> {
        use UiStreamEvent::*;
        match self {
            ToolInputStart { tool_call_id, .. }
            | ToolInputDelta { tool_call_id, .. }
            | ToolInputAvailable { tool_call_id, .. }
            | ToolInputError { tool_call_id, .. }
            | ToolOutputAvailable { tool_call_id, .. }
            | ToolOutputError { tool_call_id, .. }
            | ToolOutputDenied { tool_call_id }
            | ToolApprovalRequest { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// A `data-<kind>` event. `transient` data never enters persisted message state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataEvent", into = "RawDataEvent")]
pub struct DataEvent {
    /// The `<kind>` suffix of the `data-<kind>` tag.
    pub kind: String,
    pub id: Option<String>,
    pub data: Value,
    pub transient: Option<bool>,
}

impl DataEvent {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            data,
            transient: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = Some(true);
        self
    }

    pub fn is_transient(&self) -> bool {
        self.transient.unwrap_or(false)
    }

    pub fn event_type(&self) -> String {
        format!("{DATA_PREFIX}{}", self.kind)
    }
}

pub(crate) const DATA_PREFIX: &str = "data-";

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDataEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transient: Option<bool>,
}

impl TryFrom<RawDataEvent> for DataEvent {
    type Error = String;

    fn try_from(raw: RawDataEvent) -> Result<Self, Self::Error> {
        match raw.event_type.strip_prefix(DATA_PREFIX) {
            Some(kind) if !kind.is_empty() => Ok(DataEvent {
                kind: kind.to_string(),
                id: raw.id,
                data: raw.data,
                transient: raw.transient,
            }),
            _ => Err(format!("'{}' is not a data event type", raw.event_type)),
        }
    }
}

impl From<DataEvent> for RawDataEvent {
    fn from(event: DataEvent) -> Self {
        RawDataEvent {
            event_type: event.event_type(),
            id: event.id,
            data: event.data,
            transient: event.transient,
        }
    }
}
