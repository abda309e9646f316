//! Buffer-until-complete operator (flatMap)
//!
//! When a part starts, the optional predicate decides once whether the part is
//! buffered or streamed. Streamed parts pass through untouched. A buffered part's
//! events are held until the part completes; the transform then receives the
//! assembled part and its replacement is serialized back into events, emitted as
//! one contiguous block.
//!
//! Buffered text or reasoning parts that are still open when their step finishes
//! can no longer receive deltas, so they are flushed before the `finish-step`.
//! Everything else still buffered when the source ends is flushed in part order
//! with its best-known state.

use crate::assemble::{MessageAssembler, PartSerializer, PartSlot, SnapshotMode};
use crate::pipeline::{
    drive, Emit, OperatorState, PartContext, PartPattern, PipelineError, StepBuffer, Transform,
};
use crate::types::{EventCategory, UiMessagePart, UiStreamEvent};
use crate::utils::IdGenerator;
use crate::{BoxStream, PipeResult};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type PartPredicate = Arc<dyn Fn(&PartContext<'_>) -> bool + Send + Sync>;
pub type PartTransformFn =
    Arc<dyn Fn(UiMessagePart, &PartHistory<'_>) -> Emit<UiMessagePart> + Send + Sync>;

/// What a flatMap transform knows besides the part itself.
#[derive(Debug, Clone, Copy)]
pub struct PartHistory<'a> {
    /// Position of the part in the message; `None` for transient data.
    pub index: Option<usize>,
    /// Parts this operator completed earlier in the stream, oldest first.
    pub completed: &'a [UiMessagePart],
}

#[derive(Clone)]
pub struct FlatMapOperator {
    predicate: Option<PartPredicate>,
    transform: PartTransformFn,
    mode: SnapshotMode,
    serializer: PartSerializer,
}

impl FlatMapOperator {
    /// Buffer every part and replace it with what `transform` returns.
    pub fn new(
        transform: impl Fn(UiMessagePart, &PartHistory<'_>) -> Emit<UiMessagePart>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            predicate: None,
            transform: Arc::new(transform),
            mode: SnapshotMode::default(),
            serializer: PartSerializer::new(),
        }
    }

    /// Only buffer parts for which `predicate` holds at part start.
    pub fn when(mut self, predicate: impl Fn(&PartContext<'_>) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Only buffer parts whose type matches one of `patterns`.
    pub fn when_parts<I, S>(self, patterns: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = PartPattern::compile(patterns)?;
        Ok(self.when(move |ctx| PartPattern::any_matches(&patterns, &ctx.part_type())))
    }

    /// Re-emit matching parts unchanged, but only once complete.
    pub fn coalesce<I, S>(patterns: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(|part, _| Emit::One(part)).when_parts(patterns)
    }

    pub fn with_snapshot_mode(mut self, mode: SnapshotMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_serializer(mut self, serializer: PartSerializer) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.serializer = self.serializer.with_id_generator(ids);
        self
    }
}

impl fmt::Debug for FlatMapOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatMapOperator")
            .field("buffers_all", &self.predicate.is_none())
            .field("mode", &self.mode)
            .field("serializer", &self.serializer)
            .finish()
    }
}

#[derive(Debug)]
enum PartMode {
    Streaming,
    Buffering(Vec<UiStreamEvent>),
}

struct FlatMapState {
    assembler: MessageAssembler,
    steps: StepBuffer,
    modes: BTreeMap<usize, PartMode>,
    history: Vec<UiMessagePart>,
    predicate: Option<PartPredicate>,
    transform: PartTransformFn,
    serializer: PartSerializer,
}

impl FlatMapState {
    fn should_buffer(&self, ctx: &PartContext<'_>) -> bool {
        self.predicate.as_ref().map_or(true, |p| p(ctx))
    }

    fn on_indexed(
        &mut self,
        event: UiStreamEvent,
        index: usize,
        started: bool,
        out: &mut VecDeque<UiStreamEvent>,
    ) -> Result<(), PipelineError> {
        if started {
            let buffer = match self.assembler.part(index) {
                Some(part) => self.should_buffer(&PartContext {
                    part,
                    index: Some(index),
                }),
                None => false,
            };
            let mode = if buffer {
                PartMode::Buffering(Vec::new())
            } else {
                PartMode::Streaming
            };
            self.modes.insert(index, mode);
        }

        match self.modes.get_mut(&index) {
            Some(PartMode::Buffering(events)) => events.push(event),
            Some(PartMode::Streaming) | None => self.steps.emit(vec![event], out),
        }

        let complete = self
            .assembler
            .part(index)
            .is_some_and(UiMessagePart::is_complete);
        if complete {
            if let Some(PartMode::Buffering(events)) = self.modes.remove(&index) {
                if let Some(part) = self.assembler.part(index).cloned() {
                    self.complete(part, Some(index), events, out)?;
                }
            }
        }
        Ok(())
    }

    fn complete(
        &mut self,
        part: UiMessagePart,
        index: Option<usize>,
        original: Vec<UiStreamEvent>,
        out: &mut VecDeque<UiStreamEvent>,
    ) -> Result<(), PipelineError> {
        let history = PartHistory {
            index,
            completed: &self.history,
        };
        let replacement = (self.transform)(part.clone(), &history).into_vec();
        let events = self.serializer.serialize_all(&replacement, &original)?;
        self.history.push(part);
        self.steps.emit(events, out);
        Ok(())
    }

    fn flush(&mut self, index: usize, out: &mut VecDeque<UiStreamEvent>) -> Result<(), PipelineError> {
        let Some(PartMode::Buffering(events)) = self.modes.remove(&index) else {
            return Ok(());
        };
        let Some(part) = self.assembler.part(index).cloned() else {
            return Ok(());
        };
        debug!(index, part_type = %part.part_type(), "flushing incomplete buffered part");
        self.complete(part, Some(index), events, out)
    }

    /// Text and reasoning slots are cleared by `finish-step`; nothing can complete
    /// those parts any more.
    fn flush_step(&mut self, out: &mut VecDeque<UiStreamEvent>) -> Result<(), PipelineError> {
        let stale: Vec<usize> = self
            .modes
            .keys()
            .copied()
            .filter(|i| {
                matches!(
                    self.assembler.part(*i),
                    Some(UiMessagePart::Text { .. } | UiMessagePart::Reasoning { .. })
                )
            })
            .collect();
        for index in stale {
            self.flush(index, out)?;
            self.modes.remove(&index);
        }
        Ok(())
    }
}

impl OperatorState for FlatMapState {
    fn on_event(
        &mut self,
        event: UiStreamEvent,
        out: &mut VecDeque<UiStreamEvent>,
    ) -> Result<(), PipelineError> {
        let outcome = self.assembler.fold(&event);
        match event.category() {
            EventCategory::Meta | EventCategory::Unknown => out.push_back(event),
            EventCategory::Step => {
                if matches!(event, UiStreamEvent::FinishStep) {
                    self.flush_step(out)?;
                }
                self.steps.on_step(&event, out);
            }
            EventCategory::Streamed | EventCategory::Tool | EventCategory::Atomic => {
                match outcome.slot {
                    PartSlot::None => {
                        debug!(event_type = %event.event_type(), "orphan event dropped by flatMap");
                    }
                    PartSlot::Transient(part) => {
                        let buffer = self.should_buffer(&PartContext {
                            part: &part,
                            index: None,
                        });
                        if buffer {
                            self.complete(part, None, vec![event], out)?;
                        } else {
                            self.steps.emit(vec![event], out);
                        }
                    }
                    PartSlot::Indexed { index, started } => {
                        self.on_indexed(event, index, started, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn on_end(&mut self, out: &mut VecDeque<UiStreamEvent>) -> Result<(), PipelineError> {
        let open: Vec<usize> = self.modes.keys().copied().collect();
        for index in open {
            self.flush(index, out)?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transform for FlatMapOperator {
    fn name(&self) -> &'static str {
        "flat_map"
    }

    async fn transform(
        &self,
        input: BoxStream<'static, UiStreamEvent>,
    ) -> PipeResult<BoxStream<'static, UiStreamEvent>> {
        let state = FlatMapState {
            assembler: MessageAssembler::with_mode(self.mode),
            steps: StepBuffer::new(),
            modes: BTreeMap::new(),
            history: Vec::new(),
            predicate: self.predicate.clone(),
            transform: Arc::clone(&self.transform),
            serializer: self.serializer.clone(),
        };
        Ok(drive(input, state))
    }
}
