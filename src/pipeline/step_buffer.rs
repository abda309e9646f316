//! Step-boundary buffer
//!
//! Holds a `start-step` marker until the first content of that step is emitted.
//! The matching `finish-step` is only emitted when its `start-step` was; a step
//! that emits nothing leaves no markers behind.

use crate::types::UiStreamEvent;
use std::collections::VecDeque;
use tracing::{debug, trace};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepBuffer {
    pending: bool,
    open: bool,
}

impl StepBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `start-step` arrived; hold it.
    pub fn on_start(&mut self) {
        if self.pending {
            trace!("consecutive start-step collapsed into the pending one");
        }
        self.pending = true;
    }

    /// A `finish-step` arrived; emit it only if its `start-step` went out.
    pub fn on_finish(&mut self, out: &mut VecDeque<UiStreamEvent>) {
        if self.pending {
            self.pending = false;
            trace!("empty step suppressed");
        } else if self.open {
            self.open = false;
            out.push_back(UiStreamEvent::FinishStep);
        } else {
            // Unbalanced in the source: no start-step to suppress, pass through.
            debug!("finish-step without a start-step forwarded");
            out.push_back(UiStreamEvent::FinishStep);
        }
    }

    /// Content is about to be emitted: release a held `start-step` first.
    pub fn release(&mut self, out: &mut VecDeque<UiStreamEvent>) {
        if self.pending {
            self.pending = false;
            self.open = true;
            out.push_back(UiStreamEvent::StartStep);
        }
    }

    /// Release and then push `events`, if there are any.
    pub fn emit(&mut self, events: Vec<UiStreamEvent>, out: &mut VecDeque<UiStreamEvent>) {
        if events.is_empty() {
            return;
        }
        self.release(out);
        out.extend(events);
    }

    /// Route a step event. Returns false for any other event.
    pub fn on_step(&mut self, event: &UiStreamEvent, out: &mut VecDeque<UiStreamEvent>) -> bool {
        match event {
            UiStreamEvent::StartStep => self.on_start(),
            UiStreamEvent::FinishStep => self.on_finish(out),
            _ => return false,
        }
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}
