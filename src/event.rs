//! Structured event values delivered to handlers on resume.

use bytes::Bytes;

use crate::engine::ConnId;
use crate::http::request::HttpRequest;

/// The input a handler is resumed with.
///
/// `Connected` is delivered exactly once, when the handler is driven to its
/// first suspension point at bind or accept time; everything after that is a
/// protocol event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    /// The handler's connection is live and events will follow
    Connected { connection: ConnId },
    /// A complete HTTP request arrived on the connection
    HttpRequest(HttpRequest),
    /// A WebSocket lifecycle or message event
    WebSocket(WebSocketEvent),
}

/// One WebSocket occurrence on a connection. The protocol tag of these events
/// is always `"websocket"`.
#[derive(Debug, Clone, PartialEq)]
pub struct WebSocketEvent {
    pub kind: WsEventKind,
    pub connection: ConnId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WsEventKind {
    /// Upgrade handshake completed
    Open,
    /// A data frame arrived; payload only exists for this kind
    Message(Bytes),
    /// The connection closed
    Close,
}
