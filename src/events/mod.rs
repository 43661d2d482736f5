//! Normalized turn event model.
//!
//! Generation output from any model provider is normalized into a single
//! event vocabulary that the turn orchestrator, the resumable stream
//! registry, and the SSE surface all share. One producer emits these
//! events; persistence and any number of readers consume the same
//! sequence.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A normalized event produced during one chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Partial assistant text (streaming delta, word-boundary chunked).
    TextDelta {
        /// The content delta.
        content: String,
    },

    /// Reasoning content, for models that expose it.
    Reasoning {
        /// Reasoning content.
        content: String,
    },

    /// Tool call delta (streaming).
    ToolCallDelta {
        /// Tool call index within the round.
        index: usize,
        /// Tool call ID (may arrive in a later delta).
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Tool name (may arrive in a later delta).
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Arguments fragment (JSON string).
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },

    /// Tool call fully assembled and about to execute.
    ToolCallComplete {
        /// Tool call ID.
        id: String,
        /// Tool name.
        name: String,
        /// Complete arguments as a JSON string.
        arguments: String,
    },

    /// Tool execution result.
    ToolResult {
        /// Tool call ID this result corresponds to.
        tool_call_id: String,
        /// Tool name.
        name: String,
        /// Result content (degraded/empty on tool failure).
        content: String,
        /// Whether the tool executed successfully.
        success: bool,
    },

    /// Token usage statistics.
    Usage {
        /// Prompt tokens used.
        prompt_tokens: u32,
        /// Completion tokens used.
        completion_tokens: u32,
        /// Total tokens used.
        total_tokens: u32,
    },

    /// Error marker. Followed by a `Done` event when the turn ends.
    Error {
        /// Error message (generic, no internal diagnostics).
        message: String,
        /// Machine-readable code.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Stream done signal.
    Done {
        /// Finish reason from the provider, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

impl TurnEvent {
    /// Create a text delta event.
    pub fn text_delta(content: impl Into<String>) -> Self {
        Self::TextDelta {
            content: content.into(),
        }
    }

    /// Create a reasoning event.
    pub fn reasoning(content: impl Into<String>) -> Self {
        Self::Reasoning {
            content: content.into(),
        }
    }

    /// Create a terminal error event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code: None,
        }
    }

    /// Create a done event.
    pub fn done() -> Self {
        Self::Done {
            finish_reason: None,
        }
    }

    /// Create a done event with a finish reason.
    pub fn done_with_reason(reason: impl Into<String>) -> Self {
        Self::Done {
            finish_reason: Some(reason.into()),
        }
    }

    /// Whether this event terminates the stream.
    ///
    /// `Done` is the sole terminator; an `Error` marker is always
    /// followed by a `Done` so readers drain the full sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// A turn event with stream metadata for SSE delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Unique event ID.
    pub id: String,
    /// Sequence number within the stream.
    pub seq: u64,
    /// The normalized event.
    #[serde(flatten)]
    pub event: TurnEvent,
    /// Timestamp.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl StreamEvent {
    /// Create a new stream event.
    pub fn new(seq: u64, event: TurnEvent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            seq,
            event,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Get the SSE event type for this event.
    pub fn event_type(&self) -> &'static str {
        match &self.event {
            TurnEvent::TextDelta { .. } => "message.delta",
            TurnEvent::Reasoning { .. } => "message.reasoning",
            TurnEvent::ToolCallDelta { .. } => "tool_call.delta",
            TurnEvent::ToolCallComplete { .. } => "tool_call.complete",
            TurnEvent::ToolResult { .. } => "tool.result",
            TurnEvent::Usage { .. } => "usage",
            TurnEvent::Error { .. } => "error",
            TurnEvent::Done { .. } => "done",
        }
    }
}

/// Accumulator for streaming tool calls.
#[derive(Debug, Default, Clone)]
pub struct ToolCallAccumulator {
    /// Tool call ID.
    pub id: Option<String>,
    /// Tool name.
    pub name: Option<String>,
    /// Arguments accumulated so far.
    pub arguments: String,
}

impl ToolCallAccumulator {
    /// Apply a delta to this accumulator.
    pub fn apply_delta(
        &mut self,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    ) {
        if let Some(id) = id {
            self.id = Some(id);
        }
        if let Some(name) = name {
            self.name = Some(name);
        }
        if let Some(args) = arguments {
            self.arguments.push_str(&args);
        }
    }

    /// Check if this tool call has enough to execute.
    pub fn is_complete(&self) -> bool {
        self.id.is_some() && self.name.is_some()
    }
}

/// Buffers text deltas and re-emits them chunked at word boundaries.
///
/// Word-level chunking balances perceived latency against render thrash on
/// the client; character-level causes thrash, sentence-level feels laggy.
#[derive(Debug, Default)]
pub struct WordChunker {
    buffer: String,
}

impl WordChunker {
    /// Create an empty chunker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw delta, returning any complete word chunks.
    ///
    /// Everything up to and including the last whitespace character is
    /// released; a trailing partial word stays buffered.
    pub fn push(&mut self, delta: &str) -> Option<String> {
        self.buffer.push_str(delta);

        let split = self.buffer.rfind(char::is_whitespace)?;
        let boundary = split + self.buffer[split..].chars().next().map_or(1, char::len_utf8);
        let chunk: String = self.buffer.drain(..boundary).collect();
        Some(chunk)
    }

    /// Release whatever remains buffered (end of stream).
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}
