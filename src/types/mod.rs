//! 类型系统模块：定义 UI 消息流的事件与部件类型。
//!
//! # Types Module
//!
//! Strongly-typed representations of the UI message stream: the flat event
//! sequence on the wire, and the parts those events assemble into.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`UiStreamEvent`] | One incremental stream event (closed sum type) |
//! | [`EventCategory`] | Meta / step / streamed / tool / atomic classification |
//! | [`UiMessagePart`] | Reconstructed logical unit (text, reasoning, tool, ...) |
//! | [`ToolPart`] | Tool invocation with its forward-only [`ToolState`] |
//! | [`UiMessage`] | Ordered parts plus message-level metadata |
//!
//! ## Example
//!
//! ```rust
//! use ui_part_stream::types::{EventCategory, UiStreamEvent};
//!
//! let ev: UiStreamEvent = serde_json::from_str(
//!     r#"{"type":"text-delta","id":"t1","delta":"Hello"}"#,
//! ).unwrap();
//! assert_eq!(ev.category(), EventCategory::Streamed);
//! ```

pub mod events;
pub mod message;
pub mod part;

pub use events::{DataEvent, EventCategory, UiStreamEvent};
pub use message::{MessageRole, UiMessage};
pub use part::{DataPart, StreamState, ToolApproval, ToolPart, ToolState, UiMessagePart};
