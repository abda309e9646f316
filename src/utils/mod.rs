//! Small building blocks shared by the assembler and the operators.

pub mod id;
pub mod tool_call_registry;

pub use id::IdGenerator;
pub use tool_call_registry::{ToolCallEntry, ToolCallRegistry};
