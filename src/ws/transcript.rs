//! Token aggregation and speaker-to-channel resolution.
//!
//! Soniox diarization labels speakers S0, S1, S2, ... per connection. Vapi
//! only understands two logical channels, so the relay maps the first label
//! observed in a call to `assistant` (the assistant opens the call with its
//! first message) and every other label to `customer`. The mapping is a
//! heuristic and is lossy for calls with more than two speakers.

use crate::ws::provider::soniox::SonioxToken;
use serde::Serialize;

/// The logical role a transcript increment is attributed to.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Assistant,
    Customer,
}

/// Append-only mapping from Soniox speaker labels to Vapi channels.
///
/// The first label ever resolved binds permanently to [`Channel::Assistant`];
/// all other labels resolve to [`Channel::Customer`]. Bindings are never
/// revised for the lifetime of a session.
#[derive(Debug, Default)]
pub struct SpeakerChannelMap {
    assistant_speaker: Option<String>,
}

impl SpeakerChannelMap {
    pub fn resolve(&mut self, speaker: &str) -> Channel {
        match &self.assistant_speaker {
            None => {
                self.assistant_speaker = Some(speaker.to_string());
                Channel::Assistant
            }
            Some(first) if first == speaker => Channel::Assistant,
            Some(_) => Channel::Customer,
        }
    }
}

/// One transcript increment assembled from a single Soniox result message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Increment {
    pub text: String,
    pub speaker: Option<String>,
}

/// Assembles a transcript increment from the tokens of one result message.
///
/// Retains final tokens with non-empty text, in arrival order, concatenates
/// them, and strips Soniox end-of-turn markers. Non-final tokens are display
/// hints only and are never forwarded. Returns `None` when nothing remains
/// after stripping, in which case no frame is emitted downstream.
pub fn assemble_increment(tokens: &[SonioxToken]) -> Option<Increment> {
    let mut text_parts: Vec<&str> = Vec::new();
    let mut speaker: Option<String> = None;

    for token in tokens {
        if token.is_final && !token.text.is_empty() {
            text_parts.push(&token.text);
            if speaker.is_none() {
                speaker = token.speaker.clone();
            }
        }
    }

    if text_parts.is_empty() {
        return None;
    }

    let text = text_parts
        .concat()
        .replace("<end>", "")
        .replace("<END>", "")
        .trim()
        .to_string();
    if text.is_empty() {
        return None;
    }

    Some(Increment { text, speaker })
}
