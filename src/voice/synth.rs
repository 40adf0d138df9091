//! Streaming speech synthesis over the ElevenLabs input-stream websocket
//!
//! The client pushes text and an end-of-input terminator, then a producer
//! task decodes server audio events into indexed frames on a bounded
//! channel until the end-of-utterance signal. A socket still open after a
//! clean finish is parked for the next turn; a parked socket that fails on
//! reuse is discarded and a fresh connection opened in its place.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{AudioFrame, StopToken};
use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Frames buffered between the websocket producer and playback before the
/// producer blocks (backpressure, never unbounded buffering)
const FRAME_CHANNEL_CAPACITY: usize = 32;

type WsConn = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens and reuses synthesis connections, one utterance at a time
pub struct SpeechStreamer {
    api_key: SecretString,
    endpoint: String,
    stability: f32,
    similarity_boost: f32,
    /// Socket parked by the previous utterance's producer, if any
    idle_rx: mpsc::Receiver<WsConn>,
    idle_tx: mpsc::Sender<WsConn>,
}

impl SpeechStreamer {
    /// Create a streamer for the configured voice. No connection is opened
    /// until the first synthesis call.
    #[must_use]
    pub fn new(api_key: SecretString, voice: &VoiceConfig) -> Self {
        let (idle_tx, idle_rx) = mpsc::channel(1);
        Self {
            api_key,
            endpoint: format!(
                "wss://api.elevenlabs.io/v1/text-to-speech/{}/stream-input?model_id={}&output_format=pcm_24000",
                voice.voice_id, voice.model
            ),
            stability: voice.stability,
            similarity_boost: voice.similarity_boost,
            idle_rx,
            idle_tx,
        }
    }

    /// Send `text` for synthesis and return the lazy frame sequence.
    ///
    /// The sequence ends when the service signals end-of-utterance; a
    /// connection broken mid-stream surfaces as an error item and fails
    /// only this utterance.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamUnavailable` if no connection can be established
    /// or the text cannot be sent.
    pub async fn synthesize(&mut self, text: &str) -> Result<FrameStream> {
        let conn = match self.idle_rx.try_recv() {
            Ok(parked) => match send_utterance(parked, text).await {
                Ok(conn) => conn,
                // Parked socket went stale since last turn; this is the
                // "next use", so open the replacement now.
                Err(e) => {
                    tracing::debug!(error = %e, "parked synthesis socket stale, reconnecting");
                    send_utterance(self.connect().await?, text).await?
                }
            },
            Err(_) => send_utterance(self.connect().await?, text).await?,
        };

        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let stop = StopToken::new();
        tokio::spawn(pump_frames(conn, tx, stop.clone(), self.idle_tx.clone()));

        Ok(FrameStream { rx, stop })
    }

    /// Open a fresh connection and send the handshake message carrying the
    /// credential and voice settings.
    async fn connect(&self) -> Result<WsConn> {
        let (mut conn, _) = connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("synthesis connect failed: {e}")))?;

        let init = serde_json::json!({
            "text": " ",
            "voice_settings": {
                "stability": self.stability,
                "similarity_boost": self.similarity_boost,
            },
            "xi_api_key": self.api_key.expose_secret(),
        });
        conn.send(WsMessage::Text(init.to_string().into()))
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("synthesis handshake failed: {e}")))?;

        tracing::debug!("synthesis connection established");
        Ok(conn)
    }
}

/// Push the utterance text followed by the end-of-input terminator.
async fn send_utterance(mut conn: WsConn, text: &str) -> Result<WsConn> {
    let chunk = serde_json::json!({ "text": format!("{text} ") });
    conn.send(WsMessage::Text(chunk.to_string().into()))
        .await
        .map_err(|e| Error::UpstreamUnavailable(format!("synthesis send failed: {e}")))?;

    let terminator = serde_json::json!({ "text": "" });
    conn.send(WsMessage::Text(terminator.to_string().into()))
        .await
        .map_err(|e| Error::UpstreamUnavailable(format!("synthesis send failed: {e}")))?;

    Ok(conn)
}

/// Audio event pushed by the synthesis service
#[derive(Debug, Deserialize)]
struct ServerEvent {
    /// Base64-encoded PCM chunk
    audio: Option<String>,
    /// End-of-utterance marker
    #[serde(rename = "isFinal")]
    is_final: Option<bool>,
}

/// Read server events, decode them into indexed frames, and deliver them
/// until end-of-utterance, cancellation, or failure.
async fn pump_frames(
    mut conn: WsConn,
    tx: mpsc::Sender<Result<AudioFrame>>,
    stop: StopToken,
    idle: mpsc::Sender<WsConn>,
) {
    let mut index: u64 = 0;

    loop {
        let message = tokio::select! {
            () = stop.stopped() => {
                let _ = conn.close(None).await;
                return;
            }
            message = conn.next() => message,
        };

        match message {
            Some(Ok(WsMessage::Text(raw))) => {
                let Ok(event) = serde_json::from_str::<ServerEvent>(&raw) else {
                    tracing::trace!("ignoring unrecognized synthesis event");
                    continue;
                };

                if let Some(audio) = event.audio {
                    match BASE64.decode(audio.as_bytes()) {
                        Ok(data) => {
                            let frame = AudioFrame { index, data };
                            index += 1;
                            // Bounded send: blocks when playback lags, so
                            // frames are paced rather than piled up.
                            if tx.send(Ok(frame)).await.is_err() {
                                let _ = conn.close(None).await;
                                return;
                            }
                        }
                        Err(e) => {
                            let _ = tx
                                .send(Err(Error::UpstreamUnavailable(format!(
                                    "synthesis sent undecodable audio: {e}"
                                ))))
                                .await;
                            let _ = conn.close(None).await;
                            return;
                        }
                    }
                } else if event.is_final == Some(true) {
                    tracing::debug!(frames = index, "utterance complete");
                    // Clean finish; park the socket for the next turn if
                    // the server left it open.
                    let _ = idle.try_send(conn);
                    return;
                }
            }
            Some(Ok(WsMessage::Close(_))) | None => {
                let _ = tx
                    .send(Err(Error::UpstreamUnavailable(
                        "synthesis stream closed before end of utterance".to_string(),
                    )))
                    .await;
                return;
            }
            // Ping/pong handled by the transport; binary is not part of
            // this protocol.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                let _ = tx
                    .send(Err(Error::UpstreamUnavailable(format!(
                        "synthesis stream error: {e}"
                    ))))
                    .await;
                return;
            }
        }
    }
}

/// Lazy, finite sequence of audio frames for one utterance
pub struct FrameStream {
    rx: mpsc::Receiver<Result<AudioFrame>>,
    stop: StopToken,
}

impl FrameStream {
    /// Wrap an already-open frame channel (used by alternate producers and
    /// test harnesses).
    #[must_use]
    pub fn from_channel(rx: mpsc::Receiver<Result<AudioFrame>>, stop: StopToken) -> Self {
        Self { rx, stop }
    }

    /// Next frame, an error item, or `None` at end-of-utterance.
    pub async fn next(&mut self) -> Option<Result<AudioFrame>> {
        self.rx.recv().await
    }

    /// Cancel the sequence without error; buffered frames are discarded.
    pub fn stop(&self) {
        self.stop.stop();
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        // An abandoned stream must not leave its producer pumping.
        self.stop.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn audio_event_decodes() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"audio": "AAA=", "normalizedAlignment": null}"#).unwrap();
        assert_eq!(event.audio.as_deref(), Some("AAA="));
        assert_eq!(event.is_final, None);
    }

    #[test]
    fn final_event_decodes() {
        let event: ServerEvent = serde_json::from_str(r#"{"isFinal": true}"#).unwrap();
        assert!(event.audio.is_none());
        assert_eq!(event.is_final, Some(true));
    }

    #[test]
    fn endpoint_embeds_voice_and_model() {
        let voice = VoiceConfig {
            enabled: true,
            voice_id: "voice123".to_string(),
            model: "eleven_turbo_v2".to_string(),
            stability: 0.5,
            similarity_boost: 0.8,
        };
        let streamer = SpeechStreamer::new(SecretString::from("key".to_string()), &voice);
        assert!(streamer.endpoint.contains("/voice123/stream-input"));
        assert!(streamer.endpoint.contains("model_id=eleven_turbo_v2"));
        assert!(streamer.endpoint.contains("output_format=pcm_24000"));
    }

    #[tokio::test]
    async fn stop_halts_the_producer() {
        let (tx, rx) = mpsc::channel(1);
        let stop = StopToken::new();
        let stream = FrameStream::from_channel(rx, stop.clone());

        // Stand-in producer: pumps frames until the token stops it.
        let producer = tokio::spawn(async move {
            let mut index = 0;
            loop {
                tokio::select! {
                    () = stop.stopped() => return index,
                    sent = tx.send(Ok(AudioFrame { index, data: vec![0, 0] })) => {
                        if sent.is_err() {
                            return index;
                        }
                        index += 1;
                    }
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        stream.stop();

        let produced = tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .expect("producer should halt after stop")
            .unwrap();
        // Channel capacity is 1 and nothing consumed: production stopped
        // almost immediately rather than running away.
        assert!(produced <= 2);
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_the_producer() {
        let (tx, rx) = mpsc::channel(1);
        let stop = StopToken::new();
        let observer = stop.clone();
        let stream = FrameStream::from_channel(rx, stop);

        drop(stream);
        let _ = tx; // producer side still alive; only the token matters
        assert!(observer.is_stopped());
    }
}
