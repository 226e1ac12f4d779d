//! Network engine abstraction.
//!
//! The engine is the event-driven networking substrate: it accepts
//! connections, buffers socket IO, parses protocol framing, and reports what
//! happened as a stream of [`PollEvent`]s from [`Engine::poll`]. The manager
//! and dispatcher are written against the [`Engine`] trait; [`TcpEngine`] is
//! the default implementation.
//!
//! Engines are driven from a single thread. All write-side operations buffer:
//! an engine never blocks in `write` or `send_websocket_text`, and IO failures
//! surface later as a [`EngineEvent::Closed`] event rather than an error
//! return.

pub mod parser;
pub mod tcp;
pub mod ws;

pub use tcp::TcpEngine;

use bytes::Bytes;
use std::time::Duration;

use crate::http::request::RawRequest;

/// Identifies one connection (listening or accepted) owned by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u64);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One occurrence on a connection, as delivered by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A complete HTTP request was parsed
    HttpRequest(RawRequest),
    /// A WebSocket upgrade handshake completed on this connection
    WebSocketHandshakeDone,
    /// A WebSocket data frame arrived (payload already unmasked)
    WebSocketFrame(Bytes),
    /// The connection is gone; its id is no longer valid after this event
    Closed,
    /// Engine bookkeeping with no payload; dispatchers ignore it
    Other,
}

/// What one `poll` iteration produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A listener accepted a new connection
    Accepted { listener: ConnId, conn: ConnId },
    /// Something happened on an existing connection
    Event { conn: ConnId, event: EngineEvent },
}

/// The networking substrate the manager drives.
///
/// Single-threaded and cooperative: every method is called from the thread
/// that owns the engine, between or during `poll` iterations.
pub trait Engine {
    /// Allocates a listening connection on `address`. On failure, returns the
    /// engine's reported reason.
    fn bind(&mut self, address: &str) -> Result<ConnId, String>;

    /// Drives the engine one iteration, waiting at most `timeout` for
    /// activity, and returns the events accumulated in that window.
    fn poll(&mut self, timeout: Duration) -> Vec<PollEvent>;

    /// Queues bytes for transmission on a connection.
    fn write(&mut self, conn: ConnId, bytes: &[u8]);

    /// Marks a connection to be torn down once its outgoing buffer drains.
    fn close_after_send(&mut self, conn: ConnId);

    /// Closes a connection immediately, dropping any buffered output.
    fn close(&mut self, conn: ConnId);

    /// Allows WebSocket upgrade handshakes on a listener; accepted
    /// connections inherit the capability.
    fn enable_websocket(&mut self, conn: ConnId);

    /// Whether a connection has completed a WebSocket upgrade.
    fn is_websocket(&self, conn: ConnId) -> bool;

    /// Ids of the currently open accepted connections, listeners excluded.
    fn connections(&self) -> Vec<ConnId>;

    /// Queues a WebSocket text frame with the given payload.
    fn send_websocket_text(&mut self, conn: ConnId, text: &str);
}
