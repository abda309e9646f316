//! # ui-part-stream
//!
//! 这是 UI 消息流的部件装配与算子流水线实现：把扁平的增量事件流还原成结构化的消息部件，并在流上执行按部件感知的 filter / map / flatMap。
//!
//! Part-assembly state machine and part-aware operator pipeline for incremental UI
//! message event streams.
//!
//! ## Overview
//!
//! An upstream producer emits a flat sequence of small events (`text-delta`,
//! `tool-input-available`, `data-weather`, ...). Each event contributes to one
//! logical *part* of a message. This crate reconstructs those parts incrementally
//! and lets callers filter, rewrite or buffer the stream with full knowledge of
//! which part every event belongs to.
//!
//! ## Core Philosophy
//!
//! - **Closed Types**: events and parts are sum types matched exhaustively
//! - **Lenient Input**: events for unknown ids are no-ops, never corruption
//! - **Pull-Based**: nothing is read from the source until the consumer asks
//! - **Instance-Scoped State**: every operator owns its assembler and correlation map
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ui_part_stream::pipeline::{from_events, Emit, MapOperator, PipelineBuilder};
//! use ui_part_stream::types::UiStreamEvent;
//!
//! #[tokio::main]
//! async fn main() -> ui_part_stream::Result<()> {
//!     let pipeline = PipelineBuilder::new()
//!         .map(MapOperator::new(|ev, _part| match ev {
//!             UiStreamEvent::TextDelta { id, delta, provider_metadata } => {
//!                 Emit::One(UiStreamEvent::TextDelta {
//!                     id,
//!                     delta: delta.to_uppercase(),
//!                     provider_metadata,
//!                 })
//!             }
//!             other => Emit::One(other),
//!         }))
//!         .build()?;
//!
//!     let source = from_events(Vec::new());
//!     let (events, message) = pipeline.process_stream_with_message(source).await?;
//!     // Consume `events`, then:
//!     # drop(events);
//!     let message = message.await?;
//!     println!("{}", message.text());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Stream events, message parts and messages |
//! | [`assemble`] | Part assembler, serializer and final message collection |
//! | [`pipeline`] | filter / map / flatMap operators and the pipeline executor |
//! | [`config`] | Declarative pipeline configuration (YAML / JSON) |
//! | [`utils`] | Tool-call correlation map and id generation |

pub mod assemble;
pub mod config;
pub mod pipeline;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use assemble::{read_message, MessageAssembler, PartSerializer, SnapshotMode};
pub use config::PipelineConfig;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use types::{
    events::{DataEvent, UiStreamEvent},
    message::{MessageRole, UiMessage},
    part::{ToolPart, ToolState, UiMessagePart},
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A specialized Result for pipeline operations
pub type PipeResult<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `PipeResult<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = PipeResult<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
