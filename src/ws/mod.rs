//! WebSocket Relay Session Management
//!
//! This module contains the core logic for bridging Vapi calls to Soniox
//! over WebSockets. It is structured into submodules for clarity:
//!
//! - `protocol`: Defines the JSON-based message format spoken with Vapi.
//! - `transcript`: Pure token-aggregation and speaker-channel logic.
//! - `session`: Manages the relay lifecycle, from start frame to teardown.
//! - `provider`: Handles the upstream connection to the Soniox real-time API.

pub mod protocol;
mod provider;
pub mod session;
pub mod transcript;

pub use session::ws_handler;
