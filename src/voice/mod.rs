//! Voice output pipeline
//!
//! Streams synthesized speech over a persistent connection and plays the
//! decoded frames in real time. The synthesis producer and the playback
//! consumer are decoupled by a bounded frame channel; a shared stop token
//! lets either side be cancelled from another task.

mod playback;
mod synth;

pub use playback::{pcm16_to_f32, AudioPlayer, FrameSequencer, SampleQueue};
pub use synth::{FrameStream, SpeechStreamer};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Sample rate of synthesized audio (matches the `pcm_24000` output format)
pub const SAMPLE_RATE: u32 = 24_000;

/// One chunk of decoded audio with its sequence index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Position in the utterance; strictly increasing from zero
    pub index: u64,
    /// Raw PCM 16-bit little-endian mono samples
    pub data: Vec<u8>,
}

/// Cooperative cancellation flag shared between pipeline tasks.
///
/// `stop` is idempotent and safe to call from any task; `stopped` resolves
/// once for every waiter after the first `stop`.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopToken {
    /// Fresh, un-stopped token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every holder of this token.
    pub fn stop(&self) {
        if !self.inner.stopped.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether `stop` has been called
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Resolve once the token is stopped.
    pub async fn stopped(&self) {
        loop {
            if self.is_stopped() {
                return;
            }
            // Register interest before re-checking the flag so a `stop`
            // racing between the check and the await is not missed.
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}
