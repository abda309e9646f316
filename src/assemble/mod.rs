//! 部件装配模块：把扁平的流事件折叠成结构化的消息部件。
//!
//! # Part Assembly
//!
//! [`MessageAssembler`] folds one [`UiStreamEvent`] at a time into a running
//! [`UiMessage`] and reports, through [`FoldOutcome`], whether observable content
//! changed and which part the event landed in. [`PartSerializer`] is the inverse:
//! it turns a part back into a valid event sequence.
//!
//! ## Leniency
//!
//! Content events that address an unknown stream id or tool call id are no-ops
//! (logged at `debug`). This tolerates truncated or re-ordered streams; it never
//! mutates some other part.
//!
//! ## Snapshots
//!
//! The message is held behind an `Arc`. In [`SnapshotMode::CopyOnWrite`],
//! [`MessageAssembler::snapshot`] shares the current state and the next fold clones it
//! on write. In [`SnapshotMode::InPlace`] folds always mutate in place and
//! `snapshot` deep-clones; callers that want to retain history must take snapshots.

pub mod read;
pub mod serialize;


pub use read::read_message;
pub use serialize::PartSerializer;

use crate::types::{
    DataEvent, DataPart, StreamState, ToolApproval, ToolPart, ToolState, UiMessage,
    UiMessagePart, UiStreamEvent,
};
use crate::utils::{ToolCallEntry, ToolCallRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// How the assembler shares its message state with callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMode {
    #[default]
    InPlace,
    CopyOnWrite,
}

/// Where a folded event landed.
#[derive(Debug, Clone, PartialEq)]
pub enum PartSlot {
    /// Meta, step, unknown, or orphan events.
    None,
    /// A persisted part. `started` is true when this event created the part
    /// (always true for atomic events, including in-place data updates).
    Indexed { index: usize, started: bool },
    /// A transient data part that is not kept in the message.
    Transient(UiMessagePart),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoldOutcome {
    /// Whether observable message content (parts, id, metadata) changed.
    pub changed: bool,
    pub slot: PartSlot,
}

impl FoldOutcome {
    fn unchanged() -> Self {
        Self {
            changed: false,
            slot: PartSlot::None,
        }
    }

    fn meta(changed: bool) -> Self {
        Self {
            changed,
            slot: PartSlot::None,
        }
    }

    fn indexed(index: usize, started: bool, changed: bool) -> Self {
        Self {
            changed,
            slot: PartSlot::Indexed { index, started },
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self.slot {
            PartSlot::Indexed { index, .. } => Some(index),
            _ => None,
        }
    }

    /// True when the event opened its part.
    pub fn started(&self) -> bool {
        match self.slot {
            PartSlot::Indexed { started, .. } => started,
            PartSlot::Transient(_) => true,
            PartSlot::None => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Text,
    Reasoning,
}

/// Folds stream events into a [`UiMessage`].
#[derive(Debug)]
pub struct MessageAssembler {
    message: Arc<UiMessage>,
    mode: SnapshotMode,
    active_text: HashMap<String, usize>,
    active_reasoning: HashMap<String, usize>,
    tool_calls: ToolCallRegistry,
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::with_mode(SnapshotMode::default())
    }

    pub fn with_mode(mode: SnapshotMode) -> Self {
        Self {
            message: Arc::new(UiMessage::assistant()),
            mode,
            active_text: HashMap::new(),
            active_reasoning: HashMap::new(),
            tool_calls: ToolCallRegistry::new(),
        }
    }

    pub fn mode(&self) -> SnapshotMode {
        self.mode
    }

    pub fn message(&self) -> &UiMessage {
        &self.message
    }

    pub fn part(&self, index: usize) -> Option<&UiMessagePart> {
        self.message.parts.get(index)
    }

    /// The part a fold landed in, if any.
    pub fn resolve<'a>(&'a self, slot: &'a PartSlot) -> Option<&'a UiMessagePart> {
        match slot {
            PartSlot::Indexed { index, .. } => self.part(*index),
            PartSlot::Transient(part) => Some(part),
            PartSlot::None => None,
        }
    }

    pub fn snapshot(&self) -> Arc<UiMessage> {
        match self.mode {
            SnapshotMode::CopyOnWrite => Arc::clone(&self.message),
            SnapshotMode::InPlace => Arc::new(UiMessage::clone(&self.message)),
        }
    }

    pub fn into_message(self) -> UiMessage {
        Arc::try_unwrap(self.message).unwrap_or_else(|shared| UiMessage::clone(&shared))
    }

    /// Number of tool calls started but not yet completed.
    pub fn open_tool_calls(&self) -> usize {
        self.tool_calls.len()
    }

    fn message_mut(&mut self) -> &mut UiMessage {
        Arc::make_mut(&mut self.message)
    }

    fn push(&mut self, part: UiMessagePart) -> usize {
        let parts = &mut self.message_mut().parts;
        parts.push(part);
        parts.len() - 1
    }

    /// Fold one event into the message.
    pub fn fold(&mut self, event: &UiStreamEvent) -> FoldOutcome {
        use UiStreamEvent as E;
        match event {
            E::Start {
                message_id,
                message_metadata,
            } => {
                let mut changed = false;
                if let Some(id) = message_id {
                    self.message_mut().id = Some(id.clone());
                    changed = true;
                }
                if let Some(metadata) = message_metadata {
                    self.message_mut().merge_metadata(metadata);
                    changed = true;
                }
                FoldOutcome::meta(changed)
            }
            E::Finish { message_metadata } => match message_metadata {
                Some(metadata) => {
                    self.message_mut().merge_metadata(metadata);
                    FoldOutcome::meta(true)
                }
                None => FoldOutcome::unchanged(),
            },
            E::MessageMetadata { message_metadata } => {
                self.message_mut().merge_metadata(message_metadata);
                FoldOutcome::meta(true)
            }
            E::Error { .. } | E::Abort => FoldOutcome::unchanged(),

            E::StartStep => {
                self.push(UiMessagePart::StepStart);
                FoldOutcome::unchanged()
            }
            E::FinishStep => {
                // New step, new id slots.
                self.active_text.clear();
                self.active_reasoning.clear();
                FoldOutcome::unchanged()
            }

            E::TextStart {
                id,
                provider_metadata,
            } => self.start_stream(StreamKind::Text, id, provider_metadata),
            E::TextDelta {
                id,
                delta,
                provider_metadata,
            } => self.append_stream(StreamKind::Text, id, delta, provider_metadata),
            E::TextEnd {
                id,
                provider_metadata,
            } => self.end_stream(StreamKind::Text, id, provider_metadata),
            E::ReasoningStart {
                id,
                provider_metadata,
            } => self.start_stream(StreamKind::Reasoning, id, provider_metadata),
            E::ReasoningDelta {
                id,
                delta,
                provider_metadata,
            } => self.append_stream(StreamKind::Reasoning, id, delta, provider_metadata),
            E::ReasoningEnd {
                id,
                provider_metadata,
            } => self.end_stream(StreamKind::Reasoning, id, provider_metadata),

            E::ToolInputStart {
                tool_call_id,
                tool_name,
                dynamic,
                provider_executed,
            } => self.start_tool(tool_call_id, tool_name, *dynamic, *provider_executed),
            E::ToolInputDelta {
                tool_call_id,
                input_text_delta,
            } => self.update_tool(tool_call_id, false, |tool| {
                // Raw text only; parsing waits for tool-input-available.
                if tool.state != ToolState::InputStreaming {
                    return false;
                }
                tool.input_text.push_str(input_text_delta);
                true
            }),
            E::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
                dynamic,
                provider_executed,
                provider_metadata,
            } => {
                let started = self.ensure_tool(tool_call_id, tool_name, *dynamic, *provider_executed);
                self.update_tool(tool_call_id, started, |tool| {
                    if tool.state.rank() >= ToolState::InputAvailable.rank() {
                        return false;
                    }
                    tool.state = ToolState::InputAvailable;
                    tool.input = Some(input.clone());
                    if provider_executed.is_some() {
                        tool.provider_executed = *provider_executed;
                    }
                    if provider_metadata.is_some() {
                        tool.call_provider_metadata = provider_metadata.clone();
                    }
                    true
                })
            }
            E::ToolInputError {
                tool_call_id,
                tool_name,
                input,
                error_text,
                dynamic,
                provider_executed,
            } => {
                let started = self.ensure_tool(tool_call_id, tool_name, *dynamic, *provider_executed);
                self.update_tool(tool_call_id, started, |tool| {
                    if tool.state.is_terminal() {
                        return false;
                    }
                    tool.state = ToolState::OutputError;
                    tool.raw_input = Some(input.clone());
                    tool.error_text = Some(error_text.clone());
                    true
                })
            }
            E::ToolOutputAvailable {
                tool_call_id,
                output,
                provider_executed,
                preliminary,
                ..
            } => self.update_tool(tool_call_id, false, |tool| {
                if tool.is_complete() {
                    return false;
                }
                tool.state = ToolState::OutputAvailable;
                tool.output = Some(output.clone());
                tool.preliminary = *preliminary;
                if provider_executed.is_some() {
                    tool.provider_executed = *provider_executed;
                }
                true
            }),
            E::ToolOutputError {
                tool_call_id,
                error_text,
                provider_executed,
                ..
            } => self.update_tool(tool_call_id, false, |tool| {
                if tool.is_complete() {
                    return false;
                }
                tool.state = ToolState::OutputError;
                tool.error_text = Some(error_text.clone());
                tool.preliminary = None;
                if provider_executed.is_some() {
                    tool.provider_executed = *provider_executed;
                }
                true
            }),
            E::ToolOutputDenied { tool_call_id } => self.update_tool(tool_call_id, false, |tool| {
                if tool.is_complete() {
                    return false;
                }
                tool.state = ToolState::OutputDenied;
                tool.preliminary = None;
                true
            }),
            E::ToolApprovalRequest {
                tool_call_id,
                approval_id,
            } => self.update_tool(tool_call_id, false, |tool| {
                if tool.state.rank() >= ToolState::ApprovalRequested.rank() {
                    return false;
                }
                tool.state = ToolState::ApprovalRequested;
                tool.approval = Some(ToolApproval {
                    id: approval_id.clone(),
                });
                true
            }),

            E::SourceUrl {
                source_id,
                url,
                title,
                provider_metadata,
            } => {
                let index = self.push(UiMessagePart::SourceUrl {
                    source_id: source_id.clone(),
                    url: url.clone(),
                    title: title.clone(),
                    provider_metadata: provider_metadata.clone(),
                });
                FoldOutcome::indexed(index, true, true)
            }
            E::SourceDocument {
                source_id,
                media_type,
                title,
                filename,
                provider_metadata,
            } => {
                let index = self.push(UiMessagePart::SourceDocument {
                    source_id: source_id.clone(),
                    media_type: media_type.clone(),
                    title: title.clone(),
                    filename: filename.clone(),
                    provider_metadata: provider_metadata.clone(),
                });
                FoldOutcome::indexed(index, true, true)
            }
            E::File {
                media_type,
                url,
                provider_metadata,
            } => {
                let index = self.push(UiMessagePart::File {
                    media_type: media_type.clone(),
                    url: url.clone(),
                    provider_metadata: provider_metadata.clone(),
                });
                FoldOutcome::indexed(index, true, true)
            }
            E::Data(data) => self.fold_data(data),

            E::Unknown(_) => FoldOutcome::unchanged(),
        }
    }

    fn active_mut(&mut self, kind: StreamKind) -> &mut HashMap<String, usize> {
        match kind {
            StreamKind::Text => &mut self.active_text,
            StreamKind::Reasoning => &mut self.active_reasoning,
        }
    }

    fn start_stream(
        &mut self,
        kind: StreamKind,
        id: &str,
        provider_metadata: &Option<Value>,
    ) -> FoldOutcome {
        let text = String::new();
        let state = StreamState::Streaming;
        let provider_metadata = provider_metadata.clone();
        let part = match kind {
            StreamKind::Text => UiMessagePart::Text {
                text,
                state,
                provider_metadata,
            },
            StreamKind::Reasoning => UiMessagePart::Reasoning {
                text,
                state,
                provider_metadata,
            },
        };
        let index = self.push(part);
        if let Some(previous) = self.active_mut(kind).insert(id.to_string(), index) {
            debug!(id, previous, index, "stream id reopened before its end; starting a fresh part");
        }
        FoldOutcome::indexed(index, true, true)
    }

    fn append_stream(
        &mut self,
        kind: StreamKind,
        id: &str,
        delta: &str,
        metadata: &Option<Value>,
    ) -> FoldOutcome {
        let Some(index) = self.active_mut(kind).get(id).copied() else {
            debug!(id, ?kind, "delta for unknown stream id ignored");
            return FoldOutcome::unchanged();
        };
        if let Some(
            UiMessagePart::Text {
                text,
                provider_metadata,
                ..
            }
            | UiMessagePart::Reasoning {
                text,
                provider_metadata,
                ..
            },
        ) = self.message_mut().parts.get_mut(index)
        {
            text.push_str(delta);
            if metadata.is_some() {
                *provider_metadata = metadata.clone();
            }
        }
        FoldOutcome::indexed(index, false, true)
    }

    fn end_stream(&mut self, kind: StreamKind, id: &str, metadata: &Option<Value>) -> FoldOutcome {
        let Some(index) = self.active_mut(kind).remove(id) else {
            debug!(id, ?kind, "end for unknown stream id ignored");
            return FoldOutcome::unchanged();
        };
        if let Some(
            UiMessagePart::Text {
                state,
                provider_metadata,
                ..
            }
            | UiMessagePart::Reasoning {
                state,
                provider_metadata,
                ..
            },
        ) = self.message_mut().parts.get_mut(index)
        {
            *state = StreamState::Done;
            if metadata.is_some() {
                *provider_metadata = metadata.clone();
            }
        }
        FoldOutcome::indexed(index, false, true)
    }

    fn start_tool(
        &mut self,
        tool_call_id: &str,
        tool_name: &str,
        dynamic: Option<bool>,
        provider_executed: Option<bool>,
    ) -> FoldOutcome {
        if self.tool_calls.get(tool_call_id).is_some() {
            debug!(tool_call_id, "duplicate tool-input-start for an open call ignored");
            return FoldOutcome::unchanged();
        }
        let dynamic = dynamic.unwrap_or(false);
        let mut part = ToolPart::new(tool_call_id, tool_name);
        part.dynamic = dynamic;
        part.provider_executed = provider_executed;
        let index = self.push(UiMessagePart::Tool(part));
        self.tool_calls.register(
            tool_call_id,
            ToolCallEntry {
                tool_name: tool_name.to_string(),
                dynamic,
                part_index: index,
            },
        );
        FoldOutcome::indexed(index, true, true)
    }

    /// Opens the call if it has not been seen; returns whether it was created here.
    fn ensure_tool(
        &mut self,
        tool_call_id: &str,
        tool_name: &str,
        dynamic: Option<bool>,
        provider_executed: Option<bool>,
    ) -> bool {
        if self.tool_calls.get(tool_call_id).is_some() {
            return false;
        }
        self.start_tool(tool_call_id, tool_name, dynamic, provider_executed);
        true
    }

    fn update_tool(
        &mut self,
        tool_call_id: &str,
        started: bool,
        apply: impl FnOnce(&mut ToolPart) -> bool,
    ) -> FoldOutcome {
        let Some(index) = self.tool_calls.get(tool_call_id).map(|e| e.part_index) else {
            debug!(tool_call_id, "event for unknown tool call ignored");
            return FoldOutcome::unchanged();
        };
        let Some(tool) = self
            .message_mut()
            .parts
            .get_mut(index)
            .and_then(UiMessagePart::as_tool_mut)
        else {
            return FoldOutcome::unchanged();
        };
        let changed = apply(tool);
        if !changed {
            debug!(tool_call_id, state = ?tool.state, "tool event would regress state; ignored");
        }
        if tool.is_complete() {
            self.tool_calls.complete(tool_call_id);
        }
        FoldOutcome::indexed(index, started, changed || started)
    }

    fn fold_data(&mut self, data: &DataEvent) -> FoldOutcome {
        let part = DataPart {
            kind: data.kind.clone(),
            id: data.id.clone(),
            data: data.data.clone(),
        };
        if data.is_transient() {
            return FoldOutcome {
                changed: false,
                slot: PartSlot::Transient(UiMessagePart::Data(part)),
            };
        }
        if let Some(id) = data.id.as_deref() {
            let existing = self.message.parts.iter().position(|p| {
                matches!(p, UiMessagePart::Data(d) if d.kind == data.kind && d.id.as_deref() == Some(id))
            });
            if let Some(index) = existing {
                self.message_mut().parts[index] = UiMessagePart::Data(part);
                return FoldOutcome::indexed(index, true, true);
            }
        }
        let index = self.push(UiMessagePart::Data(part));
        FoldOutcome::indexed(index, true, true)
    }
}
