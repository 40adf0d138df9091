//! Interface adapter boundary
//!
//! Background pipeline tasks never touch interface state directly: they
//! post immutable [`Notification`] values into an mpsc queue that the
//! adapter's single-threaded loop drains each cycle. A GUI adapter drains
//! the same queue from its event loop; the console adapter here is the
//! concrete interface shipped.

mod cli;

pub use cli::run_console;

use crate::Error;

/// Lifecycle of the current playback session, as seen by the interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// A playback session began for the latest reply
    Started,
    /// The session played every frame to completion
    Finished,
    /// The session was cancelled (superseded by a newer turn or shutdown)
    Cancelled,
    /// The session ended early due to a synthesis or device failure
    Failed,
}

/// Outbound notification from the assistant core to the interface adapter
#[derive(Debug, Clone)]
pub enum Notification {
    /// Final assistant text for a completed turn
    Reply(String),
    /// A surfaced failure; `kind` is the stable machine-readable class
    Error {
        /// Stable error class (see [`Error::kind`])
        kind: &'static str,
        /// Human-readable description
        message: String,
    },
    /// Playback session state change
    Playback(PlaybackState),
}

impl Notification {
    /// Build an error notification from any pipeline error.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        Self::Error {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_notification_carries_kind_and_message() {
        let err = Error::UnknownTool("frobnicate".to_string());
        let Notification::Error { kind, message } = Notification::from_error(&err) else {
            panic!("expected error notification");
        };
        assert_eq!(kind, "unknown_tool");
        assert!(message.contains("frobnicate"));
    }
}
