//! Manages the relay session lifecycle for one Vapi connection.
//!
//! Each accepted WebSocket becomes one `RelaySession`, which owns the
//! downstream socket halves and at most one upstream task. The session walks
//! `Init → Configuring → Active → Closing → Closed` and is torn down
//! deterministically: close signal, drain the upstream task, then release
//! the sockets.

use super::{
    protocol::{AudioConfig, ClientMessage, ServerMessage},
    provider::{self, UpstreamEvent, UpstreamHandle, UpstreamStatus},
};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Lifecycle states of one relay session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Init,
    Configuring,
    Active,
    Closing,
    Closed,
}

/// Per-session state. Owned by the session loop; never shared across calls.
struct RelaySession {
    state: SessionState,
    audio_config: Option<AudioConfig>,
    forwarded_frames: u64,
    dropped_frames: u64,
}

impl RelaySession {
    fn new() -> Self {
        Self {
            state: SessionState::Init,
            audio_config: None,
            forwarded_frames: 0,
            dropped_frames: 0,
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == SessionState::Closed {
            return;
        }
        debug!(from = ?self.state, to = ?next, "Session state transition");
        self.state = next;
    }
}

/// Entry point for a single Vapi connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    let span = tracing::info_span!("relay_session", %session_id);
    async move {
        info!("New Vapi connection received");

        let (socket_tx, socket_rx) = socket.split();
        let socket_tx = Arc::new(Mutex::new(socket_tx));

        if let Err(e) = run_relay_session(state, socket_tx, socket_rx).await {
            error!(error = ?e, "Relay session terminated with error");
        }
        info!("Relay session finished");
    }
    .instrument(span)
    .await
}

/// The main event loop for one relay session.
///
/// Reads control and audio frames from Vapi and status reports from the
/// upstream task. Audio is forwarded only while the session is `Active`;
/// earlier frames are dropped and counted, never buffered.
async fn run_relay_session(
    state: Arc<AppState>,
    socket_tx: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    mut socket_rx: SplitStream<WebSocket>,
) -> Result<()> {
    let mut session = RelaySession::new();
    let (status_tx, mut status_rx) = mpsc::channel::<UpstreamStatus>(8);
    let mut upstream: Option<UpstreamHandle> = None;

    loop {
        tokio::select! {
            // Status reports take priority so a pending `Ready` is observed
            // before any audio frame racing with it.
            biased;
            Some(status) = status_rx.recv() => {
                match status {
                    UpstreamStatus::Ready => {
                        if session.state == SessionState::Configuring {
                            session.transition(SessionState::Active);
                            info!("Session active, forwarding audio");
                        }
                    }
                    UpstreamStatus::Finished => {
                        info!("Upstream reported the session finished");
                        break;
                    }
                    UpstreamStatus::Failed { message } => {
                        error!(%message, "Upstream link failed");
                        break;
                    }
                }
            },
            maybe_msg = socket_rx.next() => {
                match maybe_msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_control_frame(
                            &text,
                            &state,
                            &mut session,
                            &mut upstream,
                            &status_tx,
                            &socket_tx,
                        );
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if session.state == SessionState::Active {
                            if let Some(up) = &upstream {
                                if up.audio_tx.send(UpstreamEvent::Audio(data.into())).await.is_err() {
                                    warn!("Upstream task stopped accepting audio");
                                    break;
                                }
                                session.forwarded_frames += 1;
                            }
                        } else {
                            session.dropped_frames += 1;
                            if session.dropped_frames % 100 == 1 {
                                debug!(
                                    state = ?session.state,
                                    dropped = session.dropped_frames,
                                    "Dropping audio received before the session is active"
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Vapi closed the connection");
                        break;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "Error receiving from Vapi WebSocket");
                        break;
                    }
                }
            },
        }
    }

    session.transition(SessionState::Closing);
    if let Some(up) = upstream.take() {
        let _ = up.audio_tx.send(UpstreamEvent::Finalize).await;
        drop(up.audio_tx);
        // The sockets are released only after the upstream task has drained,
        // so no write can land on a connection this loop has already closed.
        let _ = up.task.await;
    }
    session.transition(SessionState::Closed);
    info!(
        forwarded = session.forwarded_frames,
        dropped = session.dropped_frames,
        config = ?session.audio_config,
        "Session closed"
    );
    Ok(())
}

/// Dispatches one JSON control frame from Vapi.
fn handle_control_frame(
    text: &str,
    state: &Arc<AppState>,
    session: &mut RelaySession,
    upstream: &mut Option<UpstreamHandle>,
    status_tx: &mpsc::Sender<UpstreamStatus>,
    socket_tx: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Start {
            encoding,
            container,
            sample_rate,
            channels,
        }) => {
            if session.state != SessionState::Init {
                warn!(state = ?session.state, "Ignoring duplicate start frame, first configuration wins");
                return;
            }
            let audio_config = AudioConfig::resolve(encoding, container, sample_rate, channels);
            info!(config = ?audio_config, "Received start frame");
            session.audio_config = Some(audio_config.clone());
            session.transition(SessionState::Configuring);
            *upstream = Some(provider::start_upstream(
                state.clone(),
                audio_config,
                status_tx.clone(),
                socket_tx.clone(),
            ));
        }
        Err(_) => match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => {
                warn!(frame_type = ?value.get("type"), "Ignoring unrecognized control frame");
            }
            Err(e) => {
                warn!(error = %e, "Discarding malformed control frame");
            }
        },
    }
}

/// A helper function to serialize and send a `ServerMessage` to Vapi.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
