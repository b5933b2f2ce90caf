//! Soniox Relay Library Crate
//!
//! This library contains all the core logic for the Vapi custom-transcriber
//! relay: configuration, application state, HTTP routing, and the WebSocket
//! session logic that bridges Vapi calls to Soniox real-time speech
//! recognition. The `relay` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod ws;
