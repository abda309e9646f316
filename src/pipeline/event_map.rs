//! Event mapping (UiStreamEvent -> zero, one or many UiStreamEvents)
//!
//! The mapper runs once per content event with the part that event belongs to.
//! Meta, step and unknown events bypass it. A held `start-step` is only released
//! when the mapper actually emits something for the step.

use crate::assemble::{MessageAssembler, SnapshotMode};
use crate::pipeline::{
    drive, Emit, OperatorState, PartContext, PipelineError, StepBuffer, Transform,
};
use crate::types::{EventCategory, UiStreamEvent};
use crate::{BoxStream, PipeResult};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type EventMapFn =
    Arc<dyn Fn(UiStreamEvent, &PartContext<'_>) -> Emit<UiStreamEvent> + Send + Sync>;

#[derive(Clone)]
pub struct MapOperator {
    mapper: EventMapFn,
    mode: SnapshotMode,
}

impl MapOperator {
    pub fn new(
        mapper: impl Fn(UiStreamEvent, &PartContext<'_>) -> Emit<UiStreamEvent> + Send + Sync + 'static,
    ) -> Self {
        Self {
            mapper: Arc::new(mapper),
            mode: SnapshotMode::default(),
        }
    }

    pub fn with_snapshot_mode(mut self, mode: SnapshotMode) -> Self {
        self.mode = mode;
        self
    }
}

impl fmt::Debug for MapOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapOperator")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

struct MapState {
    assembler: MessageAssembler,
    steps: StepBuffer,
    mapper: EventMapFn,
}

impl OperatorState for MapState {
    fn on_event(
        &mut self,
        event: UiStreamEvent,
        out: &mut VecDeque<UiStreamEvent>,
    ) -> Result<(), PipelineError> {
        let outcome = self.assembler.fold(&event);
        match event.category() {
            EventCategory::Meta | EventCategory::Unknown => out.push_back(event),
            EventCategory::Step => {
                self.steps.on_step(&event, out);
            }
            EventCategory::Streamed | EventCategory::Tool | EventCategory::Atomic => {
                let Some(part) = self.assembler.resolve(&outcome.slot) else {
                    debug!(event_type = %event.event_type(), "orphan event dropped by map");
                    return Ok(());
                };
                let ctx = PartContext {
                    part,
                    index: outcome.index(),
                };
                let emitted = (self.mapper)(event, &ctx).into_vec();
                self.steps.emit(emitted, out);
            }
        }
        Ok(())
    }

    fn on_end(&mut self, _out: &mut VecDeque<UiStreamEvent>) -> Result<(), PipelineError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transform for MapOperator {
    fn name(&self) -> &'static str {
        "map"
    }

    async fn transform(
        &self,
        input: BoxStream<'static, UiStreamEvent>,
    ) -> PipeResult<BoxStream<'static, UiStreamEvent>> {
        let state = MapState {
            assembler: MessageAssembler::with_mode(self.mode),
            steps: StepBuffer::new(),
            mapper: Arc::clone(&self.mapper),
        };
        Ok(drive(input, state))
    }
}
