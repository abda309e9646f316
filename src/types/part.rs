//! Message parts reconstructed from stream events

use super::events::DATA_PREFIX;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of a text or reasoning part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Streaming,
    Done,
}

/// Lifecycle of a tool part. Variants are declared in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolState {
    InputStreaming,
    InputAvailable,
    ApprovalRequested,
    OutputAvailable,
    OutputError,
    OutputDenied,
}

impl ToolState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ToolState::OutputAvailable | ToolState::OutputError | ToolState::OutputDenied
        )
    }

    /// Position in the forward-only lifecycle; terminal states share the last rank.
    pub(crate) fn rank(self) -> u8 {
        match self {
            ToolState::InputStreaming => 0,
            ToolState::InputAvailable => 1,
            ToolState::ApprovalRequested => 2,
            ToolState::OutputAvailable | ToolState::OutputError | ToolState::OutputDenied => 3,
        }
    }
}

/// A reconstructed logical unit of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum UiMessagePart {
    Text {
        text: String,
        state: StreamState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<Value>,
    },
    Reasoning {
        text: String,
        state: StreamState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<Value>,
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
    /// Placeholder contributed by `start-step`. Never complete.
    StepStart,
    #[serde(untagged)]
    Tool(ToolPart),
    #[serde(untagged)]
    Data(DataPart),
}

impl UiMessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        UiMessagePart::Text {
            text: text.into(),
            state: StreamState::Done,
            provider_metadata: None,
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        UiMessagePart::Reasoning {
            text: text.into(),
            state: StreamState::Done,
            provider_metadata: None,
        }
    }

    /// The part `type` tag, e.g. `text`, `tool-weather`, `dynamic-tool`, `data-chart`.
    pub fn part_type(&self) -> String {
        match self {
            UiMessagePart::Text { .. } => "text".to_string(),
            UiMessagePart::Reasoning { .. } => "reasoning".to_string(),
            UiMessagePart::SourceUrl { .. } => "source-url".to_string(),
            UiMessagePart::SourceDocument { .. } => "source-document".to_string(),
            UiMessagePart::File { .. } => "file".to_string(),
            UiMessagePart::StepStart => "step-start".to_string(),
            UiMessagePart::Tool(tool) => tool.part_type(),
            UiMessagePart::Data(data) => data.part_type(),
        }
    }

    /// Complete when the part has no state (atomic) or its state is terminal.
    /// A preliminary tool output is not terminal; step placeholders never complete.
    pub fn is_complete(&self) -> bool {
        match self {
            UiMessagePart::Text { state, .. } | UiMessagePart::Reasoning { state, .. } => {
                *state == StreamState::Done
            }
            UiMessagePart::Tool(tool) => tool.is_complete(),
            UiMessagePart::StepStart => false,
            UiMessagePart::SourceUrl { .. }
            | UiMessagePart::SourceDocument { .. }
            | UiMessagePart::File { .. }
            | UiMessagePart::Data(_) => true,
        }
    }

    pub fn as_tool(&self) -> Option<&ToolPart> {
        match self {
            UiMessagePart::Tool(tool) => Some(tool),
            _ => None,
        }
    }

    pub fn as_tool_mut(&mut self) -> Option<&mut ToolPart> {
        match self {
            UiMessagePart::Tool(tool) => Some(tool),
            _ => None,
        }
    }
}

/// A tool invocation. Its type tag is `tool-<name>`, or `dynamic-tool` for tools not
/// known ahead of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawToolPart", into = "RawToolPart")]
pub struct ToolPart {
    pub tool_call_id: String,
    pub tool_name: String,
    pub dynamic: bool,
    pub state: ToolState,
    /// Raw, unparsed input text accumulated from `tool-input-delta`.
    pub input_text: String,
    pub input: Option<Value>,
    /// Input that failed validation (`tool-input-error`).
    pub raw_input: Option<Value>,
    pub output: Option<Value>,
    pub error_text: Option<String>,
    pub provider_executed: Option<bool>,
    pub preliminary: Option<bool>,
    pub approval: Option<ToolApproval>,
    pub call_provider_metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolApproval {
    pub id: String,
}

impl ToolPart {
    pub fn new(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            dynamic: false,
            state: ToolState::InputStreaming,
            input_text: String::new(),
            input: None,
            raw_input: None,
            output: None,
            error_text: None,
            provider_executed: None,
            preliminary: None,
            approval: None,
            call_provider_metadata: None,
        }
    }

    pub fn part_type(&self) -> String {
        if self.dynamic {
            "dynamic-tool".to_string()
        } else {
            format!("tool-{}", self.tool_name)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_terminal() && !self.preliminary.unwrap_or(false)
    }

    /// Whether the failure happened while validating input rather than running the tool.
    pub fn is_input_error(&self) -> bool {
        self.state == ToolState::OutputError && self.input.is_none() && self.raw_input.is_some()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawToolPart {
    #[serde(rename = "type")]
    part_type: String,
    tool_call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
    state: ToolState,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    input_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider_executed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preliminary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    approval: Option<ToolApproval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    call_provider_metadata: Option<Value>,
}

impl TryFrom<RawToolPart> for ToolPart {
    type Error = String;

    fn try_from(raw: RawToolPart) -> Result<Self, Self::Error> {
        let (tool_name, dynamic) = if raw.part_type == "dynamic-tool" {
            let name = raw
                .tool_name
                .ok_or_else(|| "dynamic-tool part requires toolName".to_string())?;
            (name, true)
        } else if let Some(name) = raw.part_type.strip_prefix("tool-") {
            (name.to_string(), false)
        } else {
            return Err(format!("'{}' is not a tool part type", raw.part_type));
        };
        Ok(ToolPart {
            tool_call_id: raw.tool_call_id,
            tool_name,
            dynamic,
            state: raw.state,
            input_text: raw.input_text,
            input: raw.input,
            raw_input: raw.raw_input,
            output: raw.output,
            error_text: raw.error_text,
            provider_executed: raw.provider_executed,
            preliminary: raw.preliminary,
            approval: raw.approval,
            call_provider_metadata: raw.call_provider_metadata,
        })
    }
}

impl From<ToolPart> for RawToolPart {
    fn from(part: ToolPart) -> Self {
        RawToolPart {
            part_type: part.part_type(),
            tool_name: part.dynamic.then(|| part.tool_name.clone()),
            tool_call_id: part.tool_call_id,
            state: part.state,
            input_text: part.input_text,
            input: part.input,
            raw_input: part.raw_input,
            output: part.output,
            error_text: part.error_text,
            provider_executed: part.provider_executed,
            preliminary: part.preliminary,
            approval: part.approval,
            call_provider_metadata: part.call_provider_metadata,
        }
    }
}

/// A `data-<kind>` part. Parts sharing kind and id are updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataPart", into = "RawDataPart")]
pub struct DataPart {
    pub kind: String,
    pub id: Option<String>,
    pub data: Value,
}

impl DataPart {
    pub fn part_type(&self) -> String {
        format!("{DATA_PREFIX}{}", self.kind)
    }
}

#[derive(Serialize, Deserialize)]
struct RawDataPart {
    #[serde(rename = "type")]
    part_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    data: Value,
}

impl TryFrom<RawDataPart> for DataPart {
    type Error = String;

    fn try_from(raw: RawDataPart) -> Result<Self, Self::Error> {
        match raw.part_type.strip_prefix(DATA_PREFIX) {
            Some(kind) if !kind.is_empty() => Ok(DataPart {
                kind: kind.to_string(),
                id: raw.id,
                data: raw.data,
            }),
            _ => Err(format!("'{}' is not a data part type", raw.part_type)),
        }
    }
}

impl From<DataPart> for RawDataPart {
    fn from(part: DataPart) -> Self {
        RawDataPart {
            part_type: part.part_type(),
            id: part.id,
            data: part.data,
        }
    }
}
