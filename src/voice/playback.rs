//! Real-time audio playback
//!
//! Frames arrive at network rate and leave at the device clock's rate; a
//! bounded sample queue between them absorbs the difference. When the
//! queue is full the feed loop pauses instead of dropping frames.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::{AudioFrame, FrameStream, StopToken, SAMPLE_RATE};
use crate::{Error, Result};

/// Buffered playback ceiling (4 seconds at 24 kHz)
const MAX_BUFFERED_SAMPLES: usize = SAMPLE_RATE as usize * 4;

/// Poll interval for buffer space and drain waits
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Enforces index-monotonic frame delivery for one playback session
#[derive(Debug, Default)]
pub struct FrameSequencer {
    next: u64,
}

impl FrameSequencer {
    /// Sequencer expecting frame index zero first
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Accept the next frame, or fail with [`Error::FrameGap`] if its index
    /// is not the one expected. A gap is never played silently.
    ///
    /// # Errors
    ///
    /// Returns `FrameGap` on any reordered or missing index.
    pub fn accept(&mut self, frame: &AudioFrame) -> Result<()> {
        if frame.index != self.next {
            return Err(Error::FrameGap {
                expected: self.next,
                found: frame.index,
            });
        }
        self.next += 1;
        Ok(())
    }
}

/// Convert PCM 16-bit little-endian bytes to f32 samples.
///
/// A trailing odd byte (half a sample) is ignored.
#[must_use]
pub fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32_768.0)
        .collect()
}

/// Bounded sample buffer shared between the feed loop and the device
/// callback
#[derive(Debug)]
pub struct SampleQueue {
    capacity: usize,
    state: Mutex<QueueState>,
}

#[derive(Debug, Default)]
struct QueueState {
    samples: VecDeque<f32>,
    finished: bool,
    stopped: bool,
}

impl SampleQueue {
    /// Queue holding at most `capacity` samples
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Whether `incoming` more samples fit. An empty queue accepts any
    /// frame so oversized frames cannot wedge the feed loop.
    #[must_use]
    pub fn has_space(&self, incoming: usize) -> bool {
        let state = self.state.lock().unwrap();
        state.samples.is_empty() || state.samples.len() + incoming <= self.capacity
    }

    /// Append samples for the device to drain.
    pub fn push(&self, samples: &[f32]) {
        let mut state = self.state.lock().unwrap();
        if !state.stopped {
            state.samples.extend(samples.iter().copied());
        }
    }

    /// Buffered sample count
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().samples.len()
    }

    /// True when nothing is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().samples.is_empty()
    }

    /// Mark the producer side complete; the queue drains what remains.
    pub fn finish(&self) {
        self.state.lock().unwrap().finished = true;
    }

    /// Discard buffered samples and stop accepting more. Safe to call from
    /// any thread.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.stopped = true;
        state.samples.clear();
    }

    /// Whether `stop` has been called
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.lock().unwrap().stopped
    }

    /// Playback is over: stopped, or finished with an empty buffer
    #[must_use]
    pub fn is_drained(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.stopped || (state.finished && state.samples.is_empty())
    }

    /// Fill a device output buffer, duplicating each sample across
    /// `channels` and zero-filling once the queue runs dry.
    pub fn fill(&self, out: &mut [f32], channels: usize) {
        let mut state = self.state.lock().unwrap();
        for frame in out.chunks_mut(channels.max(1)) {
            let sample = state.samples.pop_front().unwrap_or(0.0);
            for slot in frame.iter_mut() {
                *slot = sample;
            }
        }
    }
}

/// Plays one frame sequence to the default output device
pub struct AudioPlayer {
    config: StreamConfig,
}

impl AudioPlayer {
    /// Probe the default output device for a usable 24 kHz configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AudioDeviceUnavailable`] if there is no output
    /// device or no suitable configuration.
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioDeviceUnavailable("no output device".to_string()))?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::AudioDeviceUnavailable(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: stereo, duplicating the mono signal
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
                })
            })
            .ok_or_else(|| {
                Error::AudioDeviceUnavailable("no suitable output config".to_string())
            })?;

        let config = supported.with_sample_rate(SampleRate(SAMPLE_RATE)).config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio output configured"
        );

        Ok(Self { config })
    }

    /// Play the frame sequence to completion, cancellation, or failure.
    ///
    /// The device runs on a blocking thread; this task feeds the shared
    /// queue and pauses when it is full. `stop` discards buffered samples
    /// and releases the device.
    ///
    /// # Errors
    ///
    /// Returns `FrameGap` on out-of-order frames, the stream's own error if
    /// synthesis fails mid-utterance, or `AudioDeviceUnavailable` if the
    /// device cannot be driven.
    pub async fn play(&self, mut frames: FrameStream, stop: StopToken) -> Result<()> {
        let queue = Arc::new(SampleQueue::new(MAX_BUFFERED_SAMPLES));

        let device_queue = Arc::clone(&queue);
        let config = self.config.clone();
        let device_task = tokio::task::spawn_blocking(move || {
            let result = run_device(&config, &device_queue);
            if result.is_err() {
                // Unblock the feed loop; nothing will drain the queue now.
                device_queue.stop();
            }
            result
        });

        let feed_result = feed(&mut frames, &queue, &stop).await;

        // Let the device finish what is already buffered unless cancelled.
        while !queue.is_drained() {
            if stop.is_stopped() {
                queue.stop();
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        let device_result = device_task
            .await
            .map_err(|e| Error::AudioDeviceUnavailable(format!("device task failed: {e}")))?;

        feed_result.and(device_result)
    }
}

/// Move frames from the stream into the sample queue, enforcing frame
/// order and pausing while the queue is full.
async fn feed(frames: &mut FrameStream, queue: &SampleQueue, stop: &StopToken) -> Result<()> {
    let mut sequencer = FrameSequencer::new();

    loop {
        let frame = tokio::select! {
            () = stop.stopped() => {
                frames.stop();
                queue.stop();
                return Ok(());
            }
            frame = frames.next() => frame,
        };

        match frame {
            Some(Ok(frame)) => {
                if let Err(e) = sequencer.accept(&frame) {
                    frames.stop();
                    queue.stop();
                    return Err(e);
                }

                let samples = pcm16_to_f32(&frame.data);

                // Backpressure: wait for the device to drain, never drop.
                while !queue.has_space(samples.len()) {
                    if stop.is_stopped() || queue.is_stopped() {
                        frames.stop();
                        queue.stop();
                        return Ok(());
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }

                queue.push(&samples);
            }
            Some(Err(e)) => {
                queue.stop();
                return Err(e);
            }
            None => {
                queue.finish();
                return Ok(());
            }
        }
    }
}

/// Open the default device, drain the queue through it, and release it.
fn run_device(config: &StreamConfig, queue: &Arc<SampleQueue>) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::AudioDeviceUnavailable("no output device".to_string()))?;

    let channels = config.channels as usize;
    let callback_queue = Arc::clone(queue);

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                callback_queue.fill(data, channels);
            },
            |err| {
                tracing::error!(error = %err, "audio output error");
            },
            None,
        )
        .map_err(|e| Error::AudioDeviceUnavailable(e.to_string()))?;

    stream
        .play()
        .map_err(|e| Error::AudioDeviceUnavailable(e.to_string()))?;

    while !queue.is_drained() {
        std::thread::sleep(POLL_INTERVAL);
    }

    // Short tail so the device's own buffer empties before release.
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);

    tracing::debug!("audio device released");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn frame(index: u64, samples: &[i16]) -> AudioFrame {
        let data = samples
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect::<Vec<u8>>();
        AudioFrame { index, data }
    }

    #[tokio::test]
    async fn in_order_frames_play_to_completion() {
        // Scenario: frames 0..N arrive in order; the queue ends drained
        // with every sample accounted for and no gap raised.
        let (tx, rx) = mpsc::channel(8);
        let stop = StopToken::new();
        let mut frames = FrameStream::from_channel(rx, stop.clone());

        for index in 0..5 {
            tx.send(Ok(frame(index, &[100, -100, 200])))
                .await
                .unwrap();
        }
        drop(tx);

        let queue = SampleQueue::new(MAX_BUFFERED_SAMPLES);
        feed(&mut frames, &queue, &stop).await.unwrap();

        assert_eq!(queue.len(), 15);
        assert!(!queue.is_drained()); // finished but samples still queued

        let mut out = vec![0.0f32; 15];
        queue.fill(&mut out, 1);
        assert!(queue.is_drained());
    }

    #[tokio::test]
    async fn skipped_index_raises_frame_gap() {
        let (tx, rx) = mpsc::channel(8);
        let stop = StopToken::new();
        let mut frames = FrameStream::from_channel(rx, stop.clone());

        tx.send(Ok(frame(0, &[1]))).await.unwrap();
        tx.send(Ok(frame(2, &[2]))).await.unwrap();
        drop(tx);

        let queue = SampleQueue::new(MAX_BUFFERED_SAMPLES);
        let err = feed(&mut frames, &queue, &stop).await.unwrap_err();

        assert!(matches!(
            err,
            Error::FrameGap {
                expected: 1,
                found: 2
            }
        ));
        assert!(queue.is_stopped());
    }

    #[tokio::test]
    async fn stream_error_stops_the_queue() {
        let (tx, rx) = mpsc::channel(8);
        let stop = StopToken::new();
        let mut frames = FrameStream::from_channel(rx, stop.clone());

        tx.send(Ok(frame(0, &[1]))).await.unwrap();
        tx.send(Err(Error::UpstreamUnavailable("dropped".to_string())))
            .await
            .unwrap();
        drop(tx);

        let queue = SampleQueue::new(MAX_BUFFERED_SAMPLES);
        let err = feed(&mut frames, &queue, &stop).await.unwrap_err();

        assert!(matches!(err, Error::UpstreamUnavailable(_)));
        assert!(queue.is_stopped());
    }

    #[tokio::test]
    async fn stop_token_halts_the_feed() {
        let (tx, rx) = mpsc::channel(8);
        let stop = StopToken::new();
        let mut frames = FrameStream::from_channel(rx, stop.clone());

        stop.stop();
        feed(&mut frames, &queue_for_test(), &stop).await.unwrap();
        drop(tx);
    }

    fn queue_for_test() -> SampleQueue {
        SampleQueue::new(MAX_BUFFERED_SAMPLES)
    }

    #[test]
    fn sequencer_accepts_consecutive_indices() {
        let mut seq = FrameSequencer::new();
        for index in 0..4 {
            seq.accept(&frame(index, &[0])).unwrap();
        }
    }

    #[test]
    fn sequencer_rejects_reordered_indices() {
        let mut seq = FrameSequencer::new();
        seq.accept(&frame(0, &[0])).unwrap();
        seq.accept(&frame(1, &[0])).unwrap();
        let err = seq.accept(&frame(1, &[0])).unwrap_err();
        assert!(matches!(
            err,
            Error::FrameGap {
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn pcm_conversion_scales_and_drops_trailing_byte() {
        let bytes = [0x00, 0x40, 0x00, 0xC0, 0xFF]; // 16384, -16384, half sample
        let samples = pcm16_to_f32(&bytes);
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.5).abs() < 1e-4);
        assert!((samples[1] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn queue_backpressure_accounting() {
        let queue = SampleQueue::new(4);
        assert!(queue.has_space(4));
        queue.push(&[0.0, 0.0, 0.0]);
        assert!(!queue.has_space(2));
        assert!(queue.has_space(1));

        // Device drains two samples; space opens up.
        let mut out = [0.0f32; 2];
        queue.fill(&mut out, 1);
        assert!(queue.has_space(2));
    }

    #[test]
    fn empty_queue_accepts_oversized_frames() {
        let queue = SampleQueue::new(4);
        assert!(queue.has_space(100));
        queue.push(&[0.0; 100]);
        assert_eq!(queue.len(), 100);
    }

    #[test]
    fn stop_discards_buffered_samples() {
        let queue = SampleQueue::new(16);
        queue.push(&[0.1; 8]);
        queue.stop();
        assert!(queue.is_empty());
        assert!(queue.is_drained());

        // Pushes after stop are ignored
        queue.push(&[0.2; 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn fill_duplicates_across_channels_and_zero_fills() {
        let queue = SampleQueue::new(16);
        queue.push(&[0.5]);

        let mut out = [9.0f32; 4]; // two stereo frames
        queue.fill(&mut out, 2);
        assert_eq!(out, [0.5, 0.5, 0.0, 0.0]);
    }
}
