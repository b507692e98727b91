//! Events delivered to the embedding application while a turn runs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Progress of a turn, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A streamed chunk of model output.
    TextChunk(String),
    /// Tool code about to run.
    ToolCallStarted(String),
    /// Formatted output of a successful run.
    ToolResult(String),
    /// Description of a failed run.
    ToolError(String),
    /// Loop notices, e.g. a missing terminal marker.
    Info(String),
}

impl AgentEvent {
    pub fn text(&self) -> &str {
        match self {
            Self::TextChunk(text)
            | Self::ToolCallStarted(text)
            | Self::ToolResult(text)
            | Self::ToolError(text)
            | Self::Info(text) => text,
        }
    }
}

/// Callback receiving agent events.
pub type EventSink = Arc<dyn Fn(AgentEvent) + Send + Sync>;

pub(crate) struct EventEmitter {
    sink: Option<EventSink>,
}

impl EventEmitter {
    pub(crate) fn new(sink: Option<EventSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn emit(&self, event: AgentEvent) {
        let Some(sink) = &self.sink else { return; };
        (sink)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(AgentEvent::ToolResult("3".into())).unwrap();
        assert_eq!(json, serde_json::json!({"type": "tool_result", "text": "3"}));
    }
}
