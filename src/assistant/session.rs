//! Playback session lifecycle
//!
//! One session per spoken reply: a stop token shared with the synthesis
//! producer and the playback consumer, plus the task driving them. At most
//! one session is active at a time; the assistant core cancels the prior
//! session before starting the next.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::interface::{Notification, PlaybackState};
use crate::voice::{AudioPlayer, FrameStream, StopToken};

/// One in-flight synthesis-and-playback operation
pub struct PlaybackSession {
    stop: StopToken,
    task: JoinHandle<()>,
}

impl PlaybackSession {
    /// Start playing a frame sequence, reporting lifecycle and failures on
    /// the notification queue. Synthesis/device failures are non-fatal to
    /// the turn: the text reply has already been delivered.
    #[must_use]
    pub fn begin(frames: FrameStream, notify: mpsc::Sender<Notification>) -> Self {
        let stop = StopToken::new();
        let session_stop = stop.clone();

        let task = tokio::spawn(async move {
            let _ = notify
                .send(Notification::Playback(PlaybackState::Started))
                .await;

            let player = match AudioPlayer::open() {
                Ok(player) => player,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping voice output");
                    frames.stop();
                    let _ = notify.send(Notification::from_error(&e)).await;
                    let _ = notify
                        .send(Notification::Playback(PlaybackState::Failed))
                        .await;
                    return;
                }
            };

            match player.play(frames, session_stop.clone()).await {
                Ok(()) if session_stop.is_stopped() => {
                    let _ = notify
                        .send(Notification::Playback(PlaybackState::Cancelled))
                        .await;
                }
                Ok(()) => {
                    let _ = notify
                        .send(Notification::Playback(PlaybackState::Finished))
                        .await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "playback failed");
                    let _ = notify.send(Notification::from_error(&e)).await;
                    let _ = notify
                        .send(Notification::Playback(PlaybackState::Failed))
                        .await;
                }
            }
        });

        Self { stop, task }
    }

    /// Assemble a session from an externally driven task (test harnesses).
    #[cfg(test)]
    pub(crate) fn from_parts(stop: StopToken, task: JoinHandle<()>) -> Self {
        Self { stop, task }
    }

    /// Whether the driving task has already finished
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the session and wait for its teardown: frame production
    /// stops and the device hold is released before this returns.
    pub async fn cancel(self) {
        self.stop.stop();
        let _ = self.task.await;
    }
}
