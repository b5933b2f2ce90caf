//! Handles the real-time WebSocket connection to the Soniox STT API.
//!
//! One connection per relay session. The first frame sent is the JSON
//! configuration handshake; afterwards audio is streamed as binary frames and
//! an empty text frame marks end-of-audio. Result frames come back as JSON
//! and are aggregated into transcript increments for Vapi.

use super::{UpstreamEvent, UpstreamStatus};
use crate::{
    config::Config,
    state::AppState,
    ws::{
        protocol::{AudioConfig, ServerMessage},
        session::send_msg,
        transcript::{SpeakerChannelMap, assemble_increment},
    },
};
use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tracing::{info, warn};

/// The configuration handshake Soniox expects as the first frame.
#[derive(Serialize, Debug)]
pub struct SonioxConfig {
    pub api_key: String,
    pub model: String,
    pub audio_format: String,
    pub sample_rate: u32,
    pub num_channels: u16,
    pub language_hints: Vec<String>,
    pub enable_endpoint_detection: bool,
    pub enable_speaker_diarization: bool,
}

impl SonioxConfig {
    /// Combines the session's negotiated audio parameters with the fixed
    /// recognition settings the relay always requests.
    pub fn new(config: &Config, audio: &AudioConfig) -> Self {
        Self {
            api_key: config.soniox_api_key.clone(),
            model: config.soniox_model.clone(),
            audio_format: "pcm_s16le".to_string(),
            sample_rate: audio.sample_rate,
            num_channels: audio.channels,
            language_hints: config.language_hints.clone(),
            enable_endpoint_detection: true,
            enable_speaker_diarization: true,
        }
    }
}

/// One result frame from the Soniox stream.
#[derive(Deserialize, Debug, Default)]
pub struct SonioxResponse {
    #[serde(default)]
    pub tokens: Vec<SonioxToken>,
    pub error_code: Option<u16>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub finished: bool,
}

/// A single recognition token, final or tentative.
#[derive(Deserialize, Debug, Clone)]
pub struct SonioxToken {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_final: bool,
    pub speaker: Option<String>,
    pub language: Option<String>,
}

/// Soniox error codes follow HTTP conventions; 4xx/5xx end the stream.
fn is_fatal(code: u16) -> bool {
    code >= 400
}

/// Outcome of processing one Soniox result frame.
enum ResultFlow {
    Continue,
    Finished,
}

/// Runs the upstream half of one relay session.
///
/// Connects, performs the handshake, reports readiness, and then forwards
/// audio events upstream while writing aggregated transcript increments to
/// the Vapi socket. Returns `Ok(())` on an orderly end of the stream; any
/// `Err` is session-fatal and is reported downstream by the caller.
pub(super) async fn run(
    state: Arc<AppState>,
    audio_config: AudioConfig,
    mut audio_rx: mpsc::Receiver<UpstreamEvent>,
    status_tx: mpsc::Sender<UpstreamStatus>,
    socket_tx: Arc<Mutex<SplitSink<WebSocket, Message>>>,
) -> Result<()> {
    let (ws_stream, _) = connect_async(state.config.soniox_ws_url.as_str())
        .await
        .context("Failed to connect to Soniox real-time WebSocket")?;
    let (mut soniox_tx, mut soniox_rx) = ws_stream.split();

    let handshake = SonioxConfig::new(&state.config, &audio_config);
    soniox_tx
        .send(WsMessage::Text(serde_json::to_string(&handshake)?.into()))
        .await
        .context("Failed to send Soniox configuration handshake")?;
    info!(
        sample_rate = handshake.sample_rate,
        num_channels = handshake.num_channels,
        "Connected to Soniox real-time API"
    );

    if status_tx.send(UpstreamStatus::Ready).await.is_err() {
        // The session loop is already gone; there is nothing left to relay.
        return Ok(());
    }

    let mut speakers = SpeakerChannelMap::default();
    let mut emitted: u64 = 0;
    // Cleared once the session signals end-of-audio; the result stream is
    // then drained until Soniox reports finished or closes.
    let mut audio_open = true;

    loop {
        tokio::select! {
            biased;
            event = audio_rx.recv(), if audio_open => {
                match event {
                    Some(UpstreamEvent::Audio(data)) => {
                        soniox_tx
                            .send(WsMessage::Binary(data))
                            .await
                            .context("Failed to forward audio to Soniox")?;
                    }
                    Some(UpstreamEvent::Finalize) | None => {
                        audio_open = false;
                        // An empty text frame is the Soniox end-of-audio signal.
                        if let Err(e) = soniox_tx.send(WsMessage::Text("".into())).await {
                            warn!(error = %e, "Failed to send end-of-audio signal to Soniox");
                            return Ok(());
                        }
                    }
                }
            },
            msg = soniox_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        match process_result(&text, &mut speakers, &mut emitted, &socket_tx).await? {
                            ResultFlow::Continue => {}
                            ResultFlow::Finished => return Ok(()),
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!(emitted, "Soniox closed the result stream");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Err(e).context("Soniox connection error");
                    }
                }
            },
        }
    }
}

/// Processes one Soniox result frame: error triage, increment assembly,
/// channel resolution, and emission to Vapi.
async fn process_result(
    text: &str,
    speakers: &mut SpeakerChannelMap,
    emitted: &mut u64,
    socket_tx: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
) -> Result<ResultFlow> {
    let res: SonioxResponse = match serde_json::from_str(text) {
        Ok(res) => res,
        Err(e) => {
            warn!(error = %e, "Discarding malformed Soniox result frame");
            return Ok(ResultFlow::Continue);
        }
    };

    if let Some(code) = res.error_code {
        let message = res.error_message.unwrap_or_default();
        if is_fatal(code) {
            anyhow::bail!("Soniox error {code}: {message}");
        }
        warn!(code, message = %message, "Non-fatal Soniox error");
    }

    if let Some(increment) = assemble_increment(&res.tokens) {
        let channel = increment.speaker.as_deref().map(|s| speakers.resolve(s));
        let response = ServerMessage::TranscriberResponse {
            transcription: increment.text,
            channel,
        };
        send_msg(&mut *socket_tx.lock().await, response)
            .await
            .context("Failed to write transcriber response to Vapi")?;
        *emitted += 1;
    }

    if res.finished {
        info!(emitted = *emitted, "Soniox session finished");
        return Ok(ResultFlow::Finished);
    }
    Ok(ResultFlow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    fn test_config() -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            soniox_api_key: "test-key".to_string(),
            soniox_ws_url: "ws://localhost:0".to_string(),
            soniox_model: "stt-rt-preview".to_string(),
            language_hints: vec!["en".to_string(), "ro".to_string()],
            log_level: Level::INFO,
        }
    }

    #[test]
    fn handshake_propagates_audio_config() {
        let audio = AudioConfig::resolve(None, None, Some(16_000), Some(1));
        let handshake = SonioxConfig::new(&test_config(), &audio);
        let json: serde_json::Value = serde_json::to_value(&handshake).unwrap();

        assert_eq!(json["api_key"], "test-key");
        assert_eq!(json["model"], "stt-rt-preview");
        assert_eq!(json["audio_format"], "pcm_s16le");
        assert_eq!(json["sample_rate"], 16_000);
        assert_eq!(json["num_channels"], 1);
        assert_eq!(json["language_hints"], serde_json::json!(["en", "ro"]));
        assert_eq!(json["enable_endpoint_detection"], true);
        assert_eq!(json["enable_speaker_diarization"], true);
    }

    #[test]
    fn result_frame_deserializes_tokens() {
        let text = r#"{
            "tokens": [
                {"text": "Hello", "is_final": true, "speaker": "S0", "language": "en"},
                {"text": "wor", "is_final": false}
            ],
            "final_audio_proc_ms": 720
        }"#;
        let res: SonioxResponse = serde_json::from_str(text).unwrap();
        assert_eq!(res.tokens.len(), 2);
        assert_eq!(res.tokens[0].text, "Hello");
        assert!(res.tokens[0].is_final);
        assert_eq!(res.tokens[0].speaker.as_deref(), Some("S0"));
        assert_eq!(res.tokens[0].language.as_deref(), Some("en"));
        assert!(!res.tokens[1].is_final);
        assert!(res.tokens[1].speaker.is_none());
        assert!(!res.finished);
        assert!(res.error_code.is_none());
    }

    #[test]
    fn result_frame_defaults_missing_fields() {
        let res: SonioxResponse = serde_json::from_str("{}").unwrap();
        assert!(res.tokens.is_empty());
        assert!(!res.finished);
        assert!(res.error_code.is_none());

        let res: SonioxResponse = serde_json::from_str(r#"{"finished": true}"#).unwrap();
        assert!(res.finished);
    }

    #[test]
    fn result_frame_carries_error_fields() {
        let text = r#"{"error_code": 401, "error_message": "invalid api key"}"#;
        let res: SonioxResponse = serde_json::from_str(text).unwrap();
        assert_eq!(res.error_code, Some(401));
        assert_eq!(res.error_message.as_deref(), Some("invalid api key"));
        assert!(is_fatal(401));
    }

    #[test]
    fn error_codes_below_400_are_not_fatal() {
        assert!(!is_fatal(200));
        assert!(!is_fatal(399));
        assert!(is_fatal(400));
        assert!(is_fatal(500));
    }
}
