//! Defines the WebSocket message protocol between Vapi and the relay.
//!
//! Vapi's custom-transcriber protocol interleaves JSON control frames with
//! raw binary audio frames on one connection. Control frames are modeled as
//! tagged variants and validated at the boundary; anything unparseable is
//! logged and dropped by the session loop without killing the call.

use crate::ws::transcript::Channel;
use serde::{Deserialize, Serialize};

/// Control messages sent from Vapi to the relay.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Announces a call and its audio parameters. Must precede any audio.
    #[serde(rename = "start")]
    Start {
        encoding: Option<String>,
        container: Option<String>,
        #[serde(rename = "sampleRate")]
        sample_rate: Option<u32>,
        channels: Option<u16>,
    },
}

/// Messages sent from the relay back to Vapi.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// One recognized transcript increment, tagged with the resolved channel.
    #[serde(rename = "transcriber-response")]
    TranscriberResponse {
        transcription: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        channel: Option<Channel>,
    },
    /// Reports a session-fatal error to Vapi before the connection closes.
    #[serde(rename = "error")]
    Error { message: String },
}

/// The audio parameters of one call, fixed by its first `start` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConfig {
    pub encoding: String,
    pub container: String,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioConfig {
    /// Resolves the configuration from a `start` frame, filling in the
    /// defaults Vapi assumes for omitted fields: 16-bit linear PCM, raw
    /// container, 16 kHz, stereo.
    pub fn resolve(
        encoding: Option<String>,
        container: Option<String>,
        sample_rate: Option<u32>,
        channels: Option<u16>,
    ) -> Self {
        Self {
            encoding: encoding.unwrap_or_else(|| "linear16".to_string()),
            container: container.unwrap_or_else(|| "raw".to_string()),
            sample_rate: sample_rate.unwrap_or(16_000),
            channels: channels.unwrap_or(2),
        }
    }
}
