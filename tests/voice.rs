//! Voice pipeline integration tests
//!
//! Exercises frame ordering, buffering, and cancellation without audio
//! hardware or a network connection.

use std::time::Duration;

use tokio::sync::mpsc;

use valet_assistant::{
    pcm16_to_f32, AudioFrame, Error, FrameSequencer, FrameStream, SampleQueue, StopToken,
};

/// Build a frame from i16 samples
fn frame(index: u64, samples: &[i16]) -> AudioFrame {
    AudioFrame {
        index,
        data: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
    }
}

#[test]
fn frames_in_order_pass_the_sequencer() {
    let mut sequencer = FrameSequencer::new();
    for index in 0..50 {
        sequencer.accept(&frame(index, &[0])).unwrap();
    }
}

#[test]
fn a_missing_index_is_a_frame_gap_not_a_misplay() {
    let mut sequencer = FrameSequencer::new();
    sequencer.accept(&frame(0, &[0])).unwrap();

    let err = sequencer.accept(&frame(2, &[0])).unwrap_err();
    assert!(matches!(
        err,
        Error::FrameGap {
            expected: 1,
            found: 2
        }
    ));
}

#[test]
fn a_reordered_index_is_a_frame_gap() {
    let mut sequencer = FrameSequencer::new();
    sequencer.accept(&frame(0, &[0])).unwrap();
    sequencer.accept(&frame(1, &[0])).unwrap();

    let err = sequencer.accept(&frame(0, &[0])).unwrap_err();
    assert!(matches!(err, Error::FrameGap { expected: 2, found: 0 }));
}

#[test]
fn pcm_conversion_is_linear_and_bounded() {
    let samples = pcm16_to_f32(&frame(0, &[0, 16_384, -16_384, 32_767, -32_768]).data);
    assert_eq!(samples.len(), 5);
    assert!((samples[0]).abs() < 1e-6);
    assert!((samples[1] - 0.5).abs() < 1e-4);
    assert!((samples[2] + 0.5).abs() < 1e-4);
    assert!(samples[3] <= 1.0 && samples[4] >= -1.0);
}

#[test]
fn queue_applies_backpressure_instead_of_dropping() {
    let queue = SampleQueue::new(8);

    queue.push(&[0.1; 6]);
    assert!(!queue.has_space(4), "over-capacity push must be refused");
    assert_eq!(queue.len(), 6, "refusal must not drop buffered samples");

    // Device drains; space opens without losing anything.
    let mut out = [0.0f32; 4];
    queue.fill(&mut out, 1);
    assert!(queue.has_space(4));
    assert_eq!(queue.len(), 2);
}

#[test]
fn queue_drains_only_after_finish() {
    let queue = SampleQueue::new(8);
    queue.push(&[0.5; 4]);
    assert!(!queue.is_drained());

    queue.finish();
    assert!(!queue.is_drained(), "buffered samples still owed to device");

    let mut out = [0.0f32; 4];
    queue.fill(&mut out, 1);
    assert!(queue.is_drained());
}

#[test]
fn stop_discards_and_releases_immediately() {
    let queue = SampleQueue::new(64);
    queue.push(&[0.5; 32]);

    queue.stop();
    assert!(queue.is_drained(), "stop must not wait for a drain");
    assert!(queue.is_empty(), "buffered frames are discarded on stop");
}

#[tokio::test]
async fn frame_stream_yields_items_in_channel_order() {
    let (tx, rx) = mpsc::channel(8);
    let mut stream = FrameStream::from_channel(rx, StopToken::new());

    for index in 0..3 {
        tx.send(Ok(frame(index, &[1]))).await.unwrap();
    }
    drop(tx);

    let mut indices = Vec::new();
    while let Some(item) = stream.next().await {
        indices.push(item.unwrap().index);
    }
    assert_eq!(indices, vec![0, 1, 2]);
}

#[tokio::test]
async fn stopping_a_stream_halts_its_producer() {
    // Scenario: a newer turn supersedes a still-playing session; its
    // frame production must stop once the stream is cancelled.
    let (tx, rx) = mpsc::channel(1);
    let stop = StopToken::new();
    let stream = FrameStream::from_channel(rx, stop.clone());

    let producer = tokio::spawn(async move {
        let mut produced: u64 = 0;
        loop {
            tokio::select! {
                () = stop.stopped() => return produced,
                sent = tx.send(Ok(frame(produced, &[0]))) => {
                    if sent.is_err() {
                        return produced;
                    }
                    produced += 1;
                }
            }
        }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    stream.stop();

    let produced = tokio::time::timeout(Duration::from_secs(1), producer)
        .await
        .expect("producer must halt after stop")
        .unwrap();

    // Nothing consumed and capacity is 1: the producer blocked early and
    // stopped instead of running away.
    assert!(produced <= 2);
}

#[tokio::test]
async fn dropping_a_stream_cancels_like_stop() {
    let (tx, rx) = mpsc::channel(1);
    let stop = StopToken::new();
    let observer = stop.clone();

    let stream = FrameStream::from_channel(rx, stop);
    drop(stream);

    assert!(observer.is_stopped());
    drop(tx);
}
