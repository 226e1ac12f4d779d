//! Per-connection event dispatch.
//!
//! Each connection context pairs an engine connection with the handler
//! instance that owns its application logic, and tracks where that handler is
//! in its lifecycle:
//!
//! ```text
//!   AwaitingFirstEvent ── event handled, handler suspended ──▶ AwaitingEvent
//!          │                                                       │
//!          └──── handler finished or faulted ──▶ Terminal ◀────────┘
//! ```
//!
//! On every engine event the dispatcher builds the structured event value,
//! resumes the handler, and interprets the signal. Only the HTTP path writes
//! bytes; WebSocket open/message/close are fire-and-forget notifications.

use tracing::error;

use crate::engine::{ConnId, Engine, EngineEvent};
use crate::event::{EventValue, WebSocketEvent, WsEventKind};
use crate::files::FileService;
use crate::handler::{Handler, HandlerSignal};
use crate::http::request::{RawRequest, build_http_request};
use crate::http::response::{Response, ShapeError};
use crate::http::writer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Only HTTP-request events carry a payload; everything else is a no-op
    Http,
    /// HTTP requests plus WebSocket open/message/close
    HttpWebSocket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Handler parked at its first suspension point, no event handled yet
    AwaitingFirstEvent,
    /// Handler parked again after handling at least one event
    AwaitingEvent,
    /// Handler finished or faulted; no further resumes
    Terminal,
}

/// The per-socket record binding a connection handle to its handler instance.
///
/// The context owns the handler outright; both live exactly as long as the
/// connection. The engine owns the connection itself; the context only holds
/// its id.
pub struct ConnectionContext {
    conn: ConnId,
    handler: Box<dyn Handler>,
    state: DispatchState,
    mode: DispatchMode,
}

impl ConnectionContext {
    pub fn new(conn: ConnId, handler: Box<dyn Handler>, mode: DispatchMode) -> Self {
        Self {
            conn,
            handler,
            state: DispatchState::AwaitingFirstEvent,
            mode,
        }
    }

    /// Drives the handler to its first suspension point. The handler must
    /// reach its ready-to-receive state before any event can be delivered;
    /// a handler that finishes or faults here never becomes usable, and the
    /// error carries its trace.
    pub fn start(&mut self) -> Result<(), String> {
        let connected = EventValue::Connected {
            connection: self.conn,
        };
        match self.handler.resume(connected) {
            HandlerSignal::Suspended => Ok(()),
            HandlerSignal::Finished(_) => {
                self.state = DispatchState::Terminal;
                Err("handler finished before reaching its first suspension point".to_string())
            }
            HandlerSignal::Faulted { trace } => {
                self.state = DispatchState::Terminal;
                Err(trace)
            }
        }
    }

    pub fn conn(&self) -> ConnId {
        self.conn
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }
}

/// Routes one engine event to a connection's handler.
///
/// Faults are contained here: they are traced to the operator-visible error
/// channel and the context goes terminal, but nothing unwinds to the caller.
pub fn dispatch(
    ctx: &mut ConnectionContext,
    engine: &mut dyn Engine,
    files: &mut dyn FileService,
    event: EngineEvent,
) {
    if ctx.state == DispatchState::Terminal {
        return;
    }

    match (ctx.mode, event) {
        // A WebSocket-capable connection still serves the initial HTTP
        // upgrade handshake through the plain HTTP path.
        (_, EngineEvent::HttpRequest(raw)) => dispatch_http(ctx, engine, files, &raw),
        (DispatchMode::HttpWebSocket, EngineEvent::WebSocketHandshakeDone) => {
            dispatch_websocket(ctx, WsEventKind::Open)
        }
        (DispatchMode::HttpWebSocket, EngineEvent::WebSocketFrame(data)) => {
            dispatch_websocket(ctx, WsEventKind::Message(data))
        }
        (DispatchMode::HttpWebSocket, EngineEvent::Closed) => {
            dispatch_websocket(ctx, WsEventKind::Close)
        }
        // Other engine event kinds pass through unhandled.
        _ => {}
    }
}

fn dispatch_http(
    ctx: &mut ConnectionContext,
    engine: &mut dyn Engine,
    files: &mut dyn FileService,
    raw: &RawRequest,
) {
    let request = build_http_request(raw, ctx.conn);
    match ctx.handler.resume(EventValue::HttpRequest(request)) {
        HandlerSignal::Suspended => {
            // No response yet; the connection stays open, nothing is written.
            ctx.state = DispatchState::AwaitingEvent;
        }
        HandlerSignal::Finished(value) => {
            respond(ctx.conn, engine, files, raw, &value);
            ctx.state = DispatchState::Terminal;
        }
        HandlerSignal::Faulted { trace } => {
            error!(conn = %ctx.conn, "handler fault: {trace}");
            ctx.state = DispatchState::Terminal;
        }
    }
}

fn dispatch_websocket(ctx: &mut ConnectionContext, kind: WsEventKind) {
    let event = EventValue::WebSocket(WebSocketEvent {
        kind,
        connection: ctx.conn,
    });
    match ctx.handler.resume(event) {
        HandlerSignal::Suspended => ctx.state = DispatchState::AwaitingEvent,
        HandlerSignal::Finished(_) => ctx.state = DispatchState::Terminal,
        HandlerSignal::Faulted { trace } => {
            error!(conn = %ctx.conn, "handler fault: {trace}");
            ctx.state = DispatchState::Terminal;
        }
    }
}

/// Turns a handler's final value into wire bytes.
///
/// Every path writes either a well-formed response or a 500 fallback; this is
/// the last line of defense before bytes hit the wire, and it must not fault.
/// Generic and fallback responses close the connection after sending; the
/// serving directives leave connection lifecycle to the file collaborator.
fn respond(
    conn: ConnId,
    engine: &mut dyn Engine,
    files: &mut dyn FileService,
    raw: &RawRequest,
    value: &crate::handler::Value,
) {
    match Response::from_value(value) {
        Ok(Response::Generic {
            status,
            headers,
            body,
        }) => {
            engine.write(conn, &writer::serialize(status, &headers, &body));
            engine.close_after_send(conn);
        }
        Ok(Response::ServeStatic { root }) => {
            let bytes = files.serve_static(raw, root.as_deref());
            engine.write(conn, &bytes);
        }
        Ok(Response::ServeFile { path, mime }) => {
            let bytes = files.serve_file(raw, &path, &mime);
            engine.write(conn, &bytes);
        }
        Err(err @ ShapeError::BadFilePath) => {
            engine.write(conn, &writer::fallback_with(&err.to_string()));
            engine.close_after_send(conn);
        }
        Err(_) => {
            engine.write(conn, &writer::fallback());
            engine.close_after_send(conn);
        }
    }
}
