//! Conversation state: ordered, append-only message history
//!
//! The conversation is owned exclusively by the assistant core task and
//! mutated only by appends for the lifetime of the process.

use serde::{Deserialize, Serialize};

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user input
    User,
    /// Model output (final text or a tool invocation request)
    Assistant,
    /// Result of a locally executed tool
    Tool,
    /// System instruction
    System,
}

/// A tool invocation issued by the assistant, or the call a tool-result
/// message answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id pairing the invocation with its result
    pub id: String,
    /// Registered tool name
    pub name: String,
    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

/// One entry in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author role
    pub role: Role,
    /// Text content (empty for a pure tool-invocation message)
    pub content: String,
    /// Tool-call metadata, present on assistant tool requests and tool results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call: Option<ToolCall>,
}

impl Message {
    /// User message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            call: None,
        }
    }

    /// Final assistant text
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            call: None,
        }
    }

    /// Assistant message requesting a tool invocation
    #[must_use]
    pub fn tool_request(call: ToolCall) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            call: Some(call),
        }
    }

    /// Tool result answering `call_id` for tool `name`
    #[must_use]
    pub fn tool_result(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            call: Some(ToolCall {
                id: call_id.into(),
                name: name.into(),
                arguments: serde_json::Value::Null,
            }),
        }
    }

    /// System instruction
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            call: None,
        }
    }
}

/// Ordered message history, append-only
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Empty conversation
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Append a message; the only mutation the turn loop performs
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages in order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when no message has been appended yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Role of the most recent message, if any
    #[must_use]
    pub fn last_role(&self) -> Option<Role> {
        self.messages.last().map(|m| m.role)
    }

    /// Explicit reset; never called by the turn loop
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
