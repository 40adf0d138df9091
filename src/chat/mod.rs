//! Chat completion client
//!
//! One network round trip per call: full conversation state plus tool
//! declarations in, either a final assistant text or a tool invocation
//! request out. The transport trait is the seam scripted test doubles
//! implement.

mod gemini;

pub use gemini::GeminiChat;

use async_trait::async_trait;

use crate::conversation::{Conversation, ToolCall};
use crate::tools::ToolDeclaration;
use crate::Result;

/// Outcome of one chat completion round trip
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Final assistant text for this turn
    Final(String),
    /// The model wants a tool invoked before it can answer
    ToolCall(ToolCall),
}

/// Stateless chat completion transport
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the conversation and available tools, await the reply.
    ///
    /// The conversation must be non-empty and end with a non-assistant
    /// message.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` on transport or auth failure,
    /// `MalformedResponse` if the service violates the expected schema.
    /// Neither is retried locally.
    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[ToolDeclaration],
    ) -> Result<Reply>;
}
