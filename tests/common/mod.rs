//! Shared test utilities

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use valet_assistant::{ChatTransport, Conversation, Error, Reply, Result, ToolCall, ToolDeclaration};

/// Chat transport that replays a scripted sequence of replies.
///
/// Each `complete` call consumes the next scripted entry; an exhausted
/// script reports the upstream as unavailable so runaway loops fail fast.
pub struct ScriptedChat {
    script: Mutex<VecDeque<Result<Reply>>>,
    conversation_lengths: Mutex<Vec<usize>>,
}

impl ScriptedChat {
    #[must_use]
    pub fn new(script: Vec<Result<Reply>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            conversation_lengths: Mutex::new(Vec::new()),
        }
    }

    /// Number of round trips made so far
    pub fn calls_made(&self) -> usize {
        self.conversation_lengths.lock().unwrap().len()
    }

    /// Conversation length observed at each round trip, in order
    pub fn observed_lengths(&self) -> Vec<usize> {
        self.conversation_lengths.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedChat {
    async fn complete(
        &self,
        conversation: &Conversation,
        _tools: &[ToolDeclaration],
    ) -> Result<Reply> {
        self.conversation_lengths
            .lock()
            .unwrap()
            .push(conversation.len());

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::UpstreamUnavailable("script exhausted".to_string())))
    }
}

/// A scripted tool-call reply for the given tool
#[must_use]
pub fn tool_call_reply(id: &str, name: &str) -> Reply {
    Reply::ToolCall(ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: serde_json::json!({}),
    })
}
