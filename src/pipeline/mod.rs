//! 流水线处理模块：在 UI 消息事件流上执行 filter / map / flatMap 算子。
//!
//! # Pipeline Operator Layer
//!
//! This module implements the operator pipeline that sits between an upstream
//! producer of [`UiStreamEvent`]s and a downstream consumer. Every operator owns its
//! own [`MessageAssembler`](crate::assemble::MessageAssembler), so each event is
//! seen together with the part it contributes to.
//!
//! ## Overview
//!
//! - **Pull-Based**: each output request consumes at most one input event
//! - **Part-Aware**: operators receive a [`PartContext`] alongside every content event
//! - **Step-Safe**: empty steps never reach the consumer (see [`step_buffer`])
//! - **Composable**: operators chain through the [`Transform`] trait
//!
//! ## Pipeline Stages
//!
//! ```text
//! Events → fold → step buffer → operator → (serialize) → Events
//!            │          │            │            │
//!       assembler   start-step    filter,     flatMap
//!                   held until    map,        re-emits
//!                   content       flatMap     whole parts
//! ```
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Pipeline`] | Operator chain executor |
//! | [`PipelineBuilder`] | Builder for constructing pipelines |
//! | [`Transform`] | Trait every operator implements |
//! | [`Emit`] | Zero, one or many results of a map/flatMap callback |
//! | [`PartContext`] | The part an event belongs to |
//!
//! ## Submodules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`step_buffer`] | Holds `start-step` until the step emits content |
//! | [`select`] | `filter` operator and declarative guards |
//! | [`event_map`] | `map` operator |
//! | [`accumulate`] | `flatMap` / buffer-until-complete operator |
//! | [`fan_out`] | Lockstep `tee` of one stream into two cursors |
//! | [`cancel`] | Hard cancellation of an output stream |
//!
//! ## Example
//!
//! ```rust,no_run
//! use ui_part_stream::pipeline::{select::FilterOperator, PipelineBuilder};
//!
//! let pipeline = PipelineBuilder::new()
//!     .filter(FilterOperator::include_parts(["text"])?)
//!     .build()?;
//! // let events = pipeline.process_stream(source).await?;
//! # Ok::<(), ui_part_stream::pipeline::PipelineError>(())
//! ```

pub mod accumulate;
pub mod cancel;
pub mod event_map;
pub mod fan_out;
pub mod select;
pub mod step_buffer;

#[cfg(test)]
mod tests;

use crate::assemble::{read_message, SnapshotMode};
use crate::config::{OperatorConfig, PipelineConfig};
use crate::types::{UiMessage, UiMessagePart, UiStreamEvent};
use crate::utils::IdGenerator;
use crate::{BoxStream, PipeResult};
use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use std::collections::VecDeque;
use tracing::debug;

pub use accumulate::{FlatMapOperator, PartHistory};
pub use cancel::CancelHandle;
pub use event_map::MapOperator;
pub use select::{FilterOperator, PartPattern};
pub use step_buffer::StepBuffer;

/// Core operator interface: every stage of the pipeline follows this abstraction
#[async_trait::async_trait]
pub trait Transform: Send + Sync {
    /// Short operator name used in logs and errors.
    fn name(&self) -> &'static str;

    /// A transform takes a stream of events and returns a new stream of events
    async fn transform(
        &self,
        input: BoxStream<'static, UiStreamEvent>,
    ) -> PipeResult<BoxStream<'static, UiStreamEvent>>;
}

/// Pipeline error types
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot serialize part of type '{part_type}'{}", .hint.as_ref().map(|h| format!("\n💡 Hint: {}", h)).unwrap_or_default())]
    UnsupportedPart {
        part_type: String,
        hint: Option<String>,
    },

    #[error("Stream ended without producing any message part{}", .hint.as_ref().map(|h| format!("\n💡 Hint: {}", h)).unwrap_or_default())]
    EmptyMessage { hint: Option<String> },

    #[error("Operator execution failed: {operator} - {reason}{}", .hint.as_ref().map(|h| format!("\n💡 Hint: {}", h)).unwrap_or_default())]
    Execution {
        operator: String,
        reason: String,
        hint: Option<String>,
    },
}

impl PipelineError {
    /// Attach an actionable hint to the error
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        let hint_val = Some(hint.into());
        match self {
            PipelineError::UnsupportedPart { ref mut hint, .. } => *hint = hint_val,
            PipelineError::EmptyMessage { ref mut hint } => *hint = hint_val,
            PipelineError::Execution { ref mut hint, .. } => *hint = hint_val,
            PipelineError::Configuration(_) => (),
        }
        self
    }
}

/// Result of a map or flatMap callback: drop, replace with one, or fan out.
#[derive(Debug, Clone, PartialEq)]
pub enum Emit<T> {
    Drop,
    One(T),
    Many(Vec<T>),
}

impl<T> Emit<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Emit::Drop => Vec::new(),
            Emit::One(item) => vec![item],
            Emit::Many(items) => items,
        }
    }
}

impl<T> From<T> for Emit<T> {
    fn from(item: T) -> Self {
        Emit::One(item)
    }
}

impl<T> From<Vec<T>> for Emit<T> {
    fn from(items: Vec<T>) -> Self {
        Emit::Many(items)
    }
}

impl<T> From<Option<T>> for Emit<T> {
    fn from(item: Option<T>) -> Self {
        item.map_or(Emit::Drop, Emit::One)
    }
}

/// The part a content event belongs to, as assembled so far.
#[derive(Debug, Clone, Copy)]
pub struct PartContext<'a> {
    pub part: &'a UiMessagePart,
    /// Position in the message; `None` for transient data parts.
    pub index: Option<usize>,
}

impl PartContext<'_> {
    pub fn part_type(&self) -> String {
        self.part.part_type()
    }
}

/// Per-stream operator state driven by [`drive`].
pub(crate) trait OperatorState: Send + 'static {
    fn on_event(
        &mut self,
        event: UiStreamEvent,
        out: &mut VecDeque<UiStreamEvent>,
    ) -> Result<(), PipelineError>;

    /// Called once when the source ends cleanly.
    fn on_end(&mut self, out: &mut VecDeque<UiStreamEvent>) -> Result<(), PipelineError>;
}

/// Pull events through `state`, one source event per refill of the output queue.
///
/// A source `Err` is forwarded and ends the stream without `on_end`; an operator
/// error is emitted in place of that event's output and also ends the stream.
pub(crate) fn drive<S: OperatorState>(
    input: BoxStream<'static, UiStreamEvent>,
    state: S,
) -> BoxStream<'static, UiStreamEvent> {
    // State is local to each stream to avoid cross-request contamination.
    let stream = stream::unfold(
        (input, VecDeque::<UiStreamEvent>::new(), false, state),
        |(mut input, mut q, mut ended, mut state)| async move {
            loop {
                if let Some(ev) = q.pop_front() {
                    return Some((Ok(ev), (input, q, ended, state)));
                }
                if ended {
                    return None;
                }

                match input.next().await {
                    Some(Ok(ev)) => {
                        if let Err(e) = state.on_event(ev, &mut q) {
                            q.clear();
                            ended = true;
                            return Some((Err(e.into()), (input, q, ended, state)));
                        }
                    }
                    Some(Err(e)) => {
                        ended = true;
                        return Some((Err(e), (input, q, ended, state)));
                    }
                    None => {
                        ended = true;
                        if let Err(e) = state.on_end(&mut q) {
                            q.clear();
                            return Some((Err(e.into()), (input, q, ended, state)));
                        }
                    }
                }
            }
        },
    );
    Box::pin(stream)
}

/// Wrap plain events as an infallible source stream.
pub fn from_events(events: impl IntoIterator<Item = UiStreamEvent>) -> BoxStream<'static, UiStreamEvent> {
    let events: Vec<_> = events.into_iter().collect();
    Box::pin(stream::iter(events).map(Ok))
}

/// Pipeline builder that constructs the operator chain
pub struct PipelineBuilder {
    transforms: Vec<Box<dyn Transform>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    pub fn add_transform(mut self, transform: Box<dyn Transform>) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn filter(self, filter: FilterOperator) -> Self {
        self.add_transform(Box::new(filter))
    }

    pub fn map(self, map: MapOperator) -> Self {
        self.add_transform(Box::new(map))
    }

    pub fn flat_map(self, flat_map: FlatMapOperator) -> Self {
        self.add_transform(Box::new(flat_map))
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        Ok(Pipeline {
            transforms: self.transforms,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipeline that processes UI message event streams
pub struct Pipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    /// Create pipeline from declarative configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let mode: SnapshotMode = config.assembler.snapshot_mode;
        let ids = match &config.serializer.id_prefix {
            Some(prefix) => IdGenerator::uuid(Some(prefix.clone())),
            None => IdGenerator::default(),
        };

        let mut builder = PipelineBuilder::new();
        for (i, op) in config.operators.iter().enumerate() {
            builder = match op {
                OperatorConfig::Filter(guards) => builder.filter(
                    FilterOperator::from_config(guards)
                        .map_err(|e| {
                            PipelineError::Configuration(format!("operators[{}].filter: {}", i, e))
                        })?
                        .with_snapshot_mode(mode),
                ),
                OperatorConfig::Buffer(buffer) => builder.flat_map(
                    FlatMapOperator::coalesce(&buffer.parts)
                        .map_err(|e| {
                            PipelineError::Configuration(format!("operators[{}].buffer: {}", i, e))
                        })?
                        .with_snapshot_mode(mode)
                        .with_id_generator(ids.clone()),
                ),
            };
        }

        builder.build()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Process an event stream through every operator in order
    pub async fn process_stream(
        &self,
        input: BoxStream<'static, UiStreamEvent>,
    ) -> PipeResult<BoxStream<'static, UiStreamEvent>> {
        let mut stream = input;
        for transform in &self.transforms {
            debug!(operator = transform.name(), "attaching operator");
            stream = transform.transform(stream).await?;
        }
        Ok(stream)
    }

    /// Like [`process_stream`](Self::process_stream), plus a handle that ends the output
    /// early. Cancelling drops the source and any parts still buffered by operators.
    pub async fn process_stream_with_cancel(
        &self,
        input: BoxStream<'static, UiStreamEvent>,
    ) -> PipeResult<(BoxStream<'static, UiStreamEvent>, CancelHandle)> {
        let handle = CancelHandle::new();
        let output = self.process_stream(input).await?;
        Ok((handle.guard(output), handle))
    }

    /// Process the stream and also assemble the final message from the same output.
    ///
    /// Both halves read one shared source in lockstep; the message future resolves
    /// once the output ends and can be awaited before, after or alongside the events.
    pub async fn process_stream_with_message(
        &self,
        input: BoxStream<'static, UiStreamEvent>,
    ) -> PipeResult<(
        BoxStream<'static, UiStreamEvent>,
        BoxFuture<'static, crate::Result<UiMessage>>,
    )> {
        let output = self.process_stream(input).await?;
        let (events, bookkeeping) = fan_out::tee(output);
        let message = async move { read_message(Box::pin(bookkeeping)).await }.boxed();
        Ok((Box::pin(events), message))
    }
}
