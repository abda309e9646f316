//! Part serializer (UiMessagePart -> event sequence)
//!
//! Policy is strict: every part kind has an event form except the `step-start`
//! placeholder, which is rejected with [`PipelineError::UnsupportedPart`] rather than
//! silently dropped.

use crate::pipeline::PipelineError;
use crate::types::{DataEvent, StreamState, ToolPart, ToolState, UiMessagePart, UiStreamEvent};
use crate::utils::IdGenerator;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct PartSerializer {
    ids: IdGenerator,
}

impl PartSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// Serialize one part, reusing ids from `original` (the events that produced it).
    pub fn serialize(
        &self,
        part: &UiMessagePart,
        original: &[UiStreamEvent],
    ) -> Result<Vec<UiStreamEvent>, PipelineError> {
        self.serialize_all(std::slice::from_ref(part), original)
    }

    /// Serialize several parts that replace one original part. The first part of each
    /// kind keeps the original id; later ones draw fresh ids.
    pub fn serialize_all(
        &self,
        parts: &[UiMessagePart],
        original: &[UiStreamEvent],
    ) -> Result<Vec<UiStreamEvent>, PipelineError> {
        let mut ids = IdAllocator::new(original, &self.ids);
        let transient = original
            .iter()
            .any(|e| matches!(e, UiStreamEvent::Data(d) if d.is_transient()));
        let mut out = Vec::new();
        for part in parts {
            emit_part(part, original, &mut ids, transient, &mut out)?;
        }
        Ok(out)
    }
}

struct IdAllocator<'a> {
    stream_id: Option<&'a str>,
    used: HashSet<String>,
    ids: &'a IdGenerator,
}

impl<'a> IdAllocator<'a> {
    fn new(original: &'a [UiStreamEvent], ids: &'a IdGenerator) -> Self {
        Self {
            stream_id: original.iter().find_map(UiStreamEvent::stream_id),
            used: HashSet::new(),
            ids,
        }
    }

    fn claim(&mut self, wanted: Option<&str>) -> String {
        if let Some(id) = wanted {
            if self.used.insert(id.to_string()) {
                return id.to_string();
            }
        }
        loop {
            let id = self.ids.next_id();
            if self.used.insert(id.clone()) {
                return id;
            }
        }
    }

    fn stream_id(&mut self) -> String {
        self.claim(self.stream_id)
    }
}

fn emit_part(
    part: &UiMessagePart,
    original: &[UiStreamEvent],
    ids: &mut IdAllocator<'_>,
    transient: bool,
    out: &mut Vec<UiStreamEvent>,
) -> Result<(), PipelineError> {
    match part {
        UiMessagePart::Text {
            text,
            state,
            provider_metadata,
        } => {
            let id = ids.stream_id();
            out.push(UiStreamEvent::TextStart {
                id: id.clone(),
                provider_metadata: provider_metadata.clone(),
            });
            if !text.is_empty() {
                out.push(UiStreamEvent::TextDelta {
                    id: id.clone(),
                    delta: text.clone(),
                    provider_metadata: None,
                });
            }
            if *state == StreamState::Done {
                out.push(UiStreamEvent::TextEnd {
                    id,
                    provider_metadata: None,
                });
            }
        }
        UiMessagePart::Reasoning {
            text,
            state,
            provider_metadata,
        } => {
            let id = ids.stream_id();
            out.push(UiStreamEvent::ReasoningStart {
                id: id.clone(),
                provider_metadata: provider_metadata.clone(),
            });
            if !text.is_empty() {
                out.push(UiStreamEvent::ReasoningDelta {
                    id: id.clone(),
                    delta: text.clone(),
                    provider_metadata: None,
                });
            }
            if *state == StreamState::Done {
                out.push(UiStreamEvent::ReasoningEnd {
                    id,
                    provider_metadata: None,
                });
            }
        }
        UiMessagePart::Tool(tool) => {
            let tool_call_id = ids.claim(Some(&tool.tool_call_id));
            emit_tool(tool, tool_call_id, &DynamicFlags::new(original, tool.dynamic), out);
        }
        UiMessagePart::SourceUrl {
            source_id,
            url,
            title,
            provider_metadata,
        } => out.push(UiStreamEvent::SourceUrl {
            source_id: source_id.clone(),
            url: url.clone(),
            title: title.clone(),
            provider_metadata: provider_metadata.clone(),
        }),
        UiMessagePart::SourceDocument {
            source_id,
            media_type,
            title,
            filename,
            provider_metadata,
        } => out.push(UiStreamEvent::SourceDocument {
            source_id: source_id.clone(),
            media_type: media_type.clone(),
            title: title.clone(),
            filename: filename.clone(),
            provider_metadata: provider_metadata.clone(),
        }),
        UiMessagePart::File {
            media_type,
            url,
            provider_metadata,
        } => out.push(UiStreamEvent::File {
            media_type: media_type.clone(),
            url: url.clone(),
            provider_metadata: provider_metadata.clone(),
        }),
        UiMessagePart::Data(data) => out.push(UiStreamEvent::Data(DataEvent {
            kind: data.kind.clone(),
            id: data.id.clone(),
            data: data.data.clone(),
            transient: transient.then_some(true),
        })),
        UiMessagePart::StepStart => {
            return Err(PipelineError::UnsupportedPart {
                part_type: part.part_type(),
                hint: None,
            }
            .with_hint("step markers come from the step buffer; transforms must not return step-start"));
        }
    }
    Ok(())
}

/// The `dynamic` flag each original tool event carried, so an explicit `false`
/// survives re-serialization. Falls back to `Some(true)` / `None` when the original
/// event is missing or the part's dynamic-ness changed.
struct DynamicFlags<'a> {
    original: &'a [UiStreamEvent],
    dynamic: bool,
}

impl<'a> DynamicFlags<'a> {
    fn new(original: &'a [UiStreamEvent], dynamic: bool) -> Self {
        Self { original, dynamic }
    }

    fn get(&self, event_type: &str) -> Option<bool> {
        self.original
            .iter()
            .find(|e| e.event_type() == event_type)
            .and_then(declared_dynamic)
            .filter(|flag| flag.unwrap_or(false) == self.dynamic)
            .unwrap_or_else(|| self.dynamic.then_some(true))
    }
}

fn declared_dynamic(event: &UiStreamEvent) -> Option<Option<bool>> {
    match event {
        UiStreamEvent::ToolInputStart { dynamic, .. }
        | UiStreamEvent::ToolInputAvailable { dynamic, .. }
        | UiStreamEvent::ToolInputError { dynamic, .. }
        | UiStreamEvent::ToolOutputAvailable { dynamic, .. }
        | UiStreamEvent::ToolOutputError { dynamic, .. } => Some(*dynamic),
        _ => None,
    }
}

/// start, then whatever actually arrived: raw input, input, approval, outcome.
fn emit_tool(
    tool: &ToolPart,
    tool_call_id: String,
    flags: &DynamicFlags<'_>,
    out: &mut Vec<UiStreamEvent>,
) {
    out.push(UiStreamEvent::ToolInputStart {
        tool_call_id: tool_call_id.clone(),
        tool_name: tool.tool_name.clone(),
        dynamic: flags.get("tool-input-start"),
        provider_executed: tool.provider_executed,
    });
    if !tool.input_text.is_empty() {
        out.push(UiStreamEvent::ToolInputDelta {
            tool_call_id: tool_call_id.clone(),
            input_text_delta: tool.input_text.clone(),
        });
    }

    if tool.is_input_error() {
        out.push(UiStreamEvent::ToolInputError {
            tool_call_id,
            tool_name: tool.tool_name.clone(),
            input: tool.raw_input.clone().unwrap_or(Value::Null),
            error_text: tool.error_text.clone().unwrap_or_default(),
            dynamic: flags.get("tool-input-error"),
            provider_executed: tool.provider_executed,
        });
        return;
    }

    // Terminal states outrank input-available without implying the input arrived.
    if let Some(input) = &tool.input {
        out.push(UiStreamEvent::ToolInputAvailable {
            tool_call_id: tool_call_id.clone(),
            tool_name: tool.tool_name.clone(),
            input: input.clone(),
            dynamic: flags.get("tool-input-available"),
            provider_executed: tool.provider_executed,
            provider_metadata: tool.call_provider_metadata.clone(),
        });
    }
    if let Some(approval) = &tool.approval {
        out.push(UiStreamEvent::ToolApprovalRequest {
            tool_call_id: tool_call_id.clone(),
            approval_id: approval.id.clone(),
        });
    }

    match tool.state {
        ToolState::OutputAvailable => out.push(UiStreamEvent::ToolOutputAvailable {
            tool_call_id,
            output: tool.output.clone().unwrap_or(Value::Null),
            dynamic: flags.get("tool-output-available"),
            provider_executed: tool.provider_executed,
            preliminary: tool.preliminary,
        }),
        ToolState::OutputError => out.push(UiStreamEvent::ToolOutputError {
            tool_call_id,
            error_text: tool.error_text.clone().unwrap_or_default(),
            dynamic: flags.get("tool-output-error"),
            provider_executed: tool.provider_executed,
        }),
        ToolState::OutputDenied => out.push(UiStreamEvent::ToolOutputDenied { tool_call_id }),
        ToolState::InputStreaming | ToolState::InputAvailable | ToolState::ApprovalRequested => {}
    }
}
