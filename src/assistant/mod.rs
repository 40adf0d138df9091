//! Assistant core
//!
//! A dedicated task owning the conversation, the chat/tool turn loop, and
//! the active playback session. It is reached only through an
//! [`AssistantHandle`]; submissions arriving while a turn is running queue
//! in order behind it, so conversation appends never interleave.

mod session;

pub use session::PlaybackSession;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chat::{ChatTransport, Reply};
use crate::conversation::{Conversation, Message};
use crate::interface::{Notification, PlaybackState};
use crate::tools::ToolRegistry;
use crate::voice::SpeechStreamer;
use crate::{Error, Result};

/// Chat round trips allowed per turn before the tool loop is cut off
const MAX_TOOL_ROUNDS: usize = 3;

/// Submissions buffered while a turn is in flight
const SUBMIT_QUEUE_CAPACITY: usize = 32;

/// Client half of the assistant core: submit user text for processing
#[derive(Clone)]
pub struct AssistantHandle {
    tx: mpsc::Sender<String>,
}

impl AssistantHandle {
    /// Queue a user message for the next turn. Waits for queue space if
    /// turns are backed up.
    ///
    /// # Errors
    ///
    /// Returns an error if the assistant task has shut down.
    pub async fn submit(&self, text: impl Into<String>) -> Result<()> {
        self.tx
            .send(text.into())
            .await
            .map_err(|_| Error::Assistant("assistant is not running".to_string()))
    }
}

/// The assistant core state machine
pub struct Assistant {
    chat: Arc<dyn ChatTransport>,
    tools: ToolRegistry,
    voice: Option<SpeechStreamer>,
    conversation: Conversation,
    notify: mpsc::Sender<Notification>,
    active_session: Option<PlaybackSession>,
}

impl Assistant {
    /// Assemble an assistant core. Pass `voice: None` to disable spoken
    /// replies.
    #[must_use]
    pub fn new(
        chat: Arc<dyn ChatTransport>,
        tools: ToolRegistry,
        voice: Option<SpeechStreamer>,
        notify: mpsc::Sender<Notification>,
    ) -> Self {
        Self {
            chat,
            tools,
            voice,
            conversation: Conversation::new(),
            notify,
            active_session: None,
        }
    }

    /// The conversation accumulated so far
    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Move the core onto its own task and return the submission handle.
    ///
    /// Dropping every handle shuts the task down after it drains the
    /// queue; any active playback session is cancelled on the way out.
    #[must_use]
    pub fn spawn(self) -> (AssistantHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(SUBMIT_QUEUE_CAPACITY);
        let task = tokio::spawn(self.run(rx));
        (AssistantHandle { tx }, task)
    }

    /// Drain submissions until every handle is dropped.
    async fn run(mut self, mut rx: mpsc::Receiver<String>) {
        while let Some(text) = rx.recv().await {
            if let Err(e) = self.run_turn(&text).await {
                tracing::warn!(error = %e, "turn failed");
                let _ = self.notify.send(Notification::from_error(&e)).await;
            }
        }

        if let Some(session) = self.active_session.take() {
            session.cancel().await;
        }
        tracing::debug!("assistant core stopped");
    }

    /// Process one submission to a delivered reply or a surfaced failure.
    ///
    /// The conversation keeps everything appended before a failure —
    /// partial tool exchanges are valid context and are never rolled back.
    ///
    /// # Errors
    ///
    /// Chat, tool, and loop-bound failures abort the turn. Voice failures
    /// do not reach here; they surface as secondary notifications.
    pub async fn run_turn(&mut self, text: &str) -> Result<()> {
        self.conversation.push(Message::user(text));
        let declarations = self.tools.declarations();

        for _round in 0..MAX_TOOL_ROUNDS {
            match self.chat.complete(&self.conversation, &declarations).await? {
                Reply::Final(reply) => {
                    self.conversation.push(Message::assistant(reply.clone()));
                    let _ = self.notify.send(Notification::Reply(reply.clone())).await;
                    self.speak(&reply).await;
                    return Ok(());
                }
                Reply::ToolCall(call) => {
                    tracing::debug!(tool = %call.name, "model requested tool");
                    self.conversation.push(Message::tool_request(call.clone()));
                    let result = self.tools.invoke(&call.name, &call.arguments)?;
                    self.conversation
                        .push(Message::tool_result(call.id, call.name, result));
                }
            }
        }

        Err(Error::ToolLoopExceeded(MAX_TOOL_ROUNDS))
    }

    /// Start a playback session for the reply, superseding any session
    /// still running from an earlier turn.
    async fn speak(&mut self, reply: &str) {
        let Some(streamer) = self.voice.as_mut() else {
            return;
        };

        // At-most-one-active: the prior session's production stops and its
        // device hold is released before the new one begins.
        if let Some(prior) = self.active_session.take() {
            tracing::debug!("superseding active playback session");
            prior.cancel().await;
        }

        match streamer.synthesize(reply).await {
            Ok(frames) => {
                self.active_session = Some(PlaybackSession::begin(frames, self.notify.clone()));
            }
            Err(e) => {
                // Secondary failure: the text reply is already delivered.
                tracing::warn!(error = %e, "speech synthesis unavailable");
                let _ = self.notify.send(Notification::from_error(&e)).await;
                let _ = self
                    .notify
                    .send(Notification::Playback(PlaybackState::Failed))
                    .await;
            }
        }
    }
}
