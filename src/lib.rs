//! Valet - voice-enabled conversational assistant
//!
//! This library provides the asynchronous voice-response pipeline:
//! - Chat completion with tool calling
//! - Streaming speech synthesis over a persistent connection
//! - Real-time audio playback decoupled from network rate
//! - An interface boundary that never blocks on pipeline work
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Interface adapter                    │
//! │        stdin loop  │  notification queue             │
//! └────────────────────┬────────────────────────────────┘
//!                      │ submit / notify
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Assistant core                       │
//! │   Conversation │ Chat+Tool loop │ PlaybackSession   │
//! └──────┬──────────────────────────────────┬───────────┘
//!        │                                  │
//! ┌──────▼───────────┐            ┌─────────▼───────────┐
//! │  Chat completion │            │  Speech streamer →  │
//! │  (one round trip │            │  bounded frames →   │
//! │   per tool loop) │            │  audio player       │
//! └──────────────────┘            └─────────────────────┘
//! ```

pub mod assistant;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod interface;
pub mod prompt;
pub mod tools;
pub mod voice;

pub use assistant::{Assistant, AssistantHandle, PlaybackSession};
pub use chat::{ChatTransport, GeminiChat, Reply};
pub use config::{ApiKeys, ChatConfig, Config, VoiceConfig};
pub use conversation::{Conversation, Message, Role, ToolCall};
pub use error::{Error, Result};
pub use interface::{Notification, PlaybackState};
pub use tools::{ToolDeclaration, ToolRegistry};
pub use voice::{
    pcm16_to_f32, AudioFrame, AudioPlayer, FrameSequencer, FrameStream, SampleQueue,
    SpeechStreamer, StopToken, SAMPLE_RATE,
};
