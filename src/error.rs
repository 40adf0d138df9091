//! Error types for the Valet assistant

use thiserror::Error;

/// Result type alias for Valet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Valet assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Chat or synthesis service unreachable (transport or auth failure)
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Chat service returned content violating the expected schema
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Tool call named a tool that is not registered
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Tool-call loop did not reach a final reply within the round limit
    #[error("tool loop exceeded {0} rounds without a final reply")]
    ToolLoopExceeded(usize),

    /// Audio frame arrived out of sequence
    #[error("frame gap: expected index {expected}, got {found}")]
    FrameGap {
        /// Next index the playback session expected
        expected: u64,
        /// Index actually received
        found: u64,
    },

    /// Audio output device could not be opened or configured
    #[error("audio device unavailable: {0}")]
    AudioDeviceUnavailable(String),

    /// Chat client misuse (empty conversation, assistant-final conversation)
    #[error("chat error: {0}")]
    Chat(String),

    /// Assistant core is not running or cannot accept the submission
    #[error("assistant error: {0}")]
    Assistant(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Stable machine-readable kind string, used on the interface boundary
    /// so adapters can classify errors without matching on the enum.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::MalformedResponse(_) => "malformed_response",
            Self::UnknownTool(_) => "unknown_tool",
            Self::ToolLoopExceeded(_) => "tool_loop_exceeded",
            Self::FrameGap { .. } => "frame_gap",
            Self::AudioDeviceUnavailable(_) => "audio_device_unavailable",
            Self::Chat(_) => "chat",
            Self::Assistant(_) => "assistant",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Toml(_) => "toml",
        }
    }
}
