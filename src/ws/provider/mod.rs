//! Manages the upstream real-time connection to the recognition provider.

pub mod soniox;

use crate::{
    state::AppState,
    ws::{
        protocol::{AudioConfig, ServerMessage},
        session::send_msg,
    },
};
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::SplitSink;
use std::sync::Arc;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::error;

/// An internal event passed from the session loop to the upstream task.
#[derive(Debug)]
pub enum UpstreamEvent {
    /// A chunk of call audio to forward verbatim.
    Audio(Bytes),
    /// The session is closing; send the end-of-audio signal upstream.
    Finalize,
}

/// Status reports from the upstream task back to the session loop.
#[derive(Debug)]
pub enum UpstreamStatus {
    /// The handshake succeeded; audio forwarding may begin.
    Ready,
    /// The provider reported the session finished or closed the stream.
    Finished,
    /// The upstream link failed; the session must close.
    Failed { message: String },
}

/// Everything the session loop holds onto for its upstream task.
pub struct UpstreamHandle {
    pub audio_tx: mpsc::Sender<UpstreamEvent>,
    pub task: JoinHandle<()>,
}

/// Spawns the upstream task for one session.
///
/// The task connects to Soniox, performs the configuration handshake, and
/// then concurrently forwards audio events upstream while aggregating result
/// messages into transcript increments written to `socket_tx`. Readiness and
/// failure are reported over `status_tx`; the caller must not forward audio
/// until it has observed [`UpstreamStatus::Ready`].
pub fn start_upstream(
    state: Arc<AppState>,
    audio_config: AudioConfig,
    status_tx: mpsc::Sender<UpstreamStatus>,
    socket_tx: Arc<Mutex<SplitSink<WebSocket, Message>>>,
) -> UpstreamHandle {
    let (audio_tx, audio_rx) = mpsc::channel(128);

    let task = tokio::spawn(async move {
        let result = soniox::run(
            state,
            audio_config,
            audio_rx,
            status_tx.clone(),
            socket_tx.clone(),
        )
        .await;
        match result {
            Ok(()) => {
                let _ = status_tx.send(UpstreamStatus::Finished).await;
            }
            Err(e) => {
                error!(error = ?e, "Upstream Soniox task failed");
                // One diagnostic frame before the session closes; best effort,
                // the downstream socket may itself be the failure.
                let mut sink = socket_tx.lock().await;
                let _ = send_msg(
                    &mut sink,
                    ServerMessage::Error {
                        message: format!("Transcriber failure: {}", e),
                    },
                )
                .await;
                let _ = status_tx
                    .send(UpstreamStatus::Failed {
                        message: e.to_string(),
                    })
                    .await;
            }
        }
    });

    UpstreamHandle { audio_tx, task }
}
