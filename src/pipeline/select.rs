//! Filter operator and declarative guards
//!
//! Meta, step and unknown events always pass; the predicate only sees content
//! events together with the part they belong to. A held `start-step` is released
//! as soon as the step has observable content, even if that content is then
//! filtered out, so the step's markers survive an exclusion.

use crate::assemble::{MessageAssembler, SnapshotMode};
use crate::config::FilterConfig;
use crate::pipeline::{drive, OperatorState, PartContext, PipelineError, StepBuffer, Transform};
use crate::types::{EventCategory, UiStreamEvent};
use crate::{BoxStream, PipeResult};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub type EventPredicate = Arc<dyn Fn(&UiStreamEvent, &PartContext<'_>) -> bool + Send + Sync>;

/// A part or event type, optionally ending in `*` to match by prefix
/// (`tool-*`, `data-*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartPattern {
    prefix: String,
    wildcard: bool,
}

impl PartPattern {
    pub fn parse(pattern: &str) -> Result<Self, PipelineError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(PipelineError::Configuration(
                "type pattern must not be empty".to_string(),
            ));
        }
        let (prefix, wildcard) = match pattern.strip_suffix('*') {
            Some(prefix) => (prefix, true),
            None => (pattern, false),
        };
        if prefix.contains('*') {
            return Err(PipelineError::Configuration(format!(
                "invalid type pattern '{}': '*' is only allowed at the end",
                pattern
            )));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            wildcard,
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        if self.wildcard {
            value.starts_with(&self.prefix)
        } else {
            value == self.prefix
        }
    }

    pub fn any_matches(patterns: &[PartPattern], value: &str) -> bool {
        patterns.iter().any(|p| p.matches(value))
    }

    pub fn compile<I, S>(patterns: I) -> Result<Vec<PartPattern>, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        patterns
            .into_iter()
            .map(|p| PartPattern::parse(p.as_ref()))
            .collect()
    }
}

impl FromStr for PartPattern {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PartPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, if self.wildcard { "*" } else { "" })
    }
}

/// Drops content events the predicate rejects.
#[derive(Clone)]
pub struct FilterOperator {
    predicate: EventPredicate,
    mode: SnapshotMode,
}

impl FilterOperator {
    pub fn new(
        predicate: impl Fn(&UiStreamEvent, &PartContext<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            predicate: Arc::new(predicate),
            mode: SnapshotMode::default(),
        }
    }

    /// Keep only parts whose type matches one of `patterns`.
    pub fn include_parts<I, S>(patterns: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = PartPattern::compile(patterns)?;
        Ok(Self::new(move |_, ctx| {
            PartPattern::any_matches(&patterns, &ctx.part_type())
        }))
    }

    /// Drop parts whose type matches one of `patterns`.
    pub fn exclude_parts<I, S>(patterns: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = PartPattern::compile(patterns)?;
        Ok(Self::new(move |_, ctx| {
            !PartPattern::any_matches(&patterns, &ctx.part_type())
        }))
    }

    /// Keep only content events whose `type` matches one of `patterns`.
    pub fn include_events<I, S>(patterns: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = PartPattern::compile(patterns)?;
        Ok(Self::new(move |ev, _| {
            PartPattern::any_matches(&patterns, &ev.event_type())
        }))
    }

    /// Drop content events whose `type` matches one of `patterns`.
    pub fn exclude_events<I, S>(patterns: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = PartPattern::compile(patterns)?;
        Ok(Self::new(move |ev, _| {
            !PartPattern::any_matches(&patterns, &ev.event_type())
        }))
    }

    /// Accept only what both filters accept.
    pub fn and(self, other: FilterOperator) -> Self {
        let (a, b) = (self.predicate, other.predicate);
        Self {
            predicate: Arc::new(move |ev: &UiStreamEvent, ctx: &PartContext<'_>| {
                a(ev, ctx) && b(ev, ctx)
            }),
            mode: self.mode,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Result<Self, PipelineError> {
        let mut guards = Vec::new();
        if !config.include_parts.is_empty() {
            guards.push(Self::include_parts(&config.include_parts)?);
        }
        if !config.exclude_parts.is_empty() {
            guards.push(Self::exclude_parts(&config.exclude_parts)?);
        }
        if !config.include_events.is_empty() {
            guards.push(Self::include_events(&config.include_events)?);
        }
        if !config.exclude_events.is_empty() {
            guards.push(Self::exclude_events(&config.exclude_events)?);
        }
        guards
            .into_iter()
            .reduce(Self::and)
            .ok_or_else(|| PipelineError::Configuration("filter names no guard".to_string()))
    }

    pub fn with_snapshot_mode(mut self, mode: SnapshotMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn accepts(&self, event: &UiStreamEvent, ctx: &PartContext<'_>) -> bool {
        (self.predicate)(event, ctx)
    }
}

impl fmt::Debug for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterOperator")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

struct FilterState {
    assembler: MessageAssembler,
    steps: StepBuffer,
    predicate: EventPredicate,
}

impl OperatorState for FilterState {
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
                    debug!(event_type = %event.event_type(), "orphan event dropped by filter");
                    return Ok(());
                };
                self.steps.release(out);
                let ctx = PartContext {
                    part,
                    index: outcome.index(),
                };
                if (self.predicate)(&event, &ctx) {
                    out.push_back(event);
                }
            }
        }
        Ok(())
    }

    fn on_end(&mut self, _out: &mut VecDeque<UiStreamEvent>) -> Result<(), PipelineError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transform for FilterOperator {
    fn name(&self) -> &'static str {
        "filter"
    }

    async fn transform(
        &self,
        input: BoxStream<'static, UiStreamEvent>,
    ) -> PipeResult<BoxStream<'static, UiStreamEvent>> {
        let state = FilterState {
            assembler: MessageAssembler::with_mode(self.mode),
            steps: StepBuffer::new(),
            predicate: Arc::clone(&self.predicate),
        };
        Ok(drive(input, state))
    }
}
