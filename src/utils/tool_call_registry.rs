use std::collections::HashMap;

/// What only the first event of a tool call carries, plus where its part lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallEntry {
    pub tool_name: String,
    pub dynamic: bool,
    /// Index of the tool part in the owning message.
    pub part_index: usize,
}

/// Correlates later tool events (which carry only `toolCallId`) with the name and
/// flags announced on `tool-input-start`.
///
/// Owned by one assembler; entries are removed when the call completes, so the table
/// only ever holds the currently open calls.
#[derive(Debug, Default)]
pub struct ToolCallRegistry {
    calls: HashMap<String, ToolCallEntry>,
}

impl ToolCallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false (and keeps the existing entry) when the call id is already open.
    pub fn register(&mut self, tool_call_id: &str, entry: ToolCallEntry) -> bool {
        if self.calls.contains_key(tool_call_id) {
            return false;
        }
        self.calls.insert(tool_call_id.to_string(), entry);
        true
    }

    pub fn get(&self, tool_call_id: &str) -> Option<&ToolCallEntry> {
        self.calls.get(tool_call_id)
    }

    pub fn complete(&mut self, tool_call_id: &str) -> Option<ToolCallEntry> {
        self.calls.remove(tool_call_id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
