//! The manager: owns one engine instance and every connection registered on
//! it, and exposes the five public operations: create, bind, bind with
//! WebSocket support, poll, broadcast.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::dispatch::{self, ConnectionContext, DispatchMode};
use crate::engine::{ConnId, Engine, EngineEvent, PollEvent, TcpEngine};
use crate::files::{DiskFiles, FileService};
use crate::handler::HandlerFactory;

/// A bind call failed. Fatal to that bind only; the manager stays usable.
#[derive(Debug, Error)]
pub enum BindError {
    /// The engine could not allocate the listening connection
    #[error("could not bind to {address}: {reason}")]
    Address { address: String, reason: String },
    /// The handler faulted (or finished) before reaching its first suspension
    /// point; the listening connection was torn down
    #[error("handler failed to start on {address}: {trace}")]
    Handler { address: String, trace: String },
}

/// Owns the event-loop engine and the contexts of all connections on it.
///
/// Single-threaded: the manager is driven by repeated [`Manager::poll`] calls
/// on one thread, and handlers run inside those calls. Dropping the manager
/// tears down the engine and every socket on it.
pub struct Manager<E = TcpEngine, S = DiskFiles> {
    engine: E,
    files: S,
    contexts: HashMap<ConnId, ConnectionContext>,
    factories: HashMap<ConnId, Box<dyn HandlerFactory>>,
}

impl Manager {
    /// A manager over the default TCP engine and disk file serving.
    /// Engine construction is infallible.
    pub fn new() -> Self {
        Manager::with_parts(TcpEngine::new(), DiskFiles::new())
    }
}

impl Default for Manager {
    fn default() -> Self {
        Manager::new()
    }
}

impl<E: Engine, S: FileService> Manager<E, S> {
    /// A manager over an explicit engine and file-serving collaborator.
    pub fn with_parts(engine: E, files: S) -> Self {
        Self {
            engine,
            files,
            contexts: HashMap::new(),
            factories: HashMap::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn files(&self) -> &S {
        &self.files
    }

    /// Binds an HTTP listener on `address`. One handler is constructed via
    /// `factory` and driven to its first suspension point before this
    /// returns; each accepted connection gets its own handler the same way.
    pub fn bind_http(
        &mut self,
        address: &str,
        factory: impl HandlerFactory + 'static,
    ) -> Result<ConnId, BindError> {
        self.bind(address, factory, DispatchMode::Http)
    }

    /// Like [`Manager::bind_http`], but the resulting connections accept
    /// WebSocket upgrade handshakes and their handlers additionally receive
    /// open/message/close events.
    pub fn bind_http_websocket(
        &mut self,
        address: &str,
        factory: impl HandlerFactory + 'static,
    ) -> Result<ConnId, BindError> {
        self.bind(address, factory, DispatchMode::HttpWebSocket)
    }

    fn bind(
        &mut self,
        address: &str,
        factory: impl HandlerFactory + 'static,
        mode: DispatchMode,
    ) -> Result<ConnId, BindError> {
        let conn = self.engine.bind(address).map_err(|reason| BindError::Address {
            address: address.to_string(),
            reason,
        })?;
        if mode == DispatchMode::HttpWebSocket {
            self.engine.enable_websocket(conn);
        }

        let mut ctx = ConnectionContext::new(conn, factory.create(), mode);
        if let Err(trace) = ctx.start() {
            error!(conn = %conn, "handler fault before first suspension: {trace}");
            self.engine.close(conn);
            return Err(BindError::Handler {
                address: address.to_string(),
                trace,
            });
        }

        info!(conn = %conn, "listening on {address}");
        self.contexts.insert(conn, ctx);
        self.factories.insert(conn, Box::new(factory));
        Ok(conn)
    }

    /// Drives the engine one iteration, waiting at most `wait_ms` for
    /// activity, and dispatches every event it produced. Never fails: a
    /// handler fault during dispatch is isolated to its connection and the
    /// remaining events are still delivered.
    pub fn poll(&mut self, wait_ms: u64) {
        let events = self.engine.poll(Duration::from_millis(wait_ms));
        for poll_event in events {
            match poll_event {
                PollEvent::Accepted { listener, conn } => self.accept(listener, conn),
                PollEvent::Event { conn, event } => {
                    let closing = matches!(event, EngineEvent::Closed);
                    if let Some(ctx) = self.contexts.get_mut(&conn) {
                        dispatch::dispatch(ctx, &mut self.engine, &mut self.files, event);
                    }
                    // Context teardown is tied to connection teardown.
                    if closing {
                        self.contexts.remove(&conn);
                    }
                }
            }
        }
    }

    /// Pushes a WebSocket text frame with payload `text` to every open
    /// connection in WebSocket mode. Connections that have not completed an
    /// upgrade are skipped; a raw frame would corrupt their stream.
    pub fn broadcast(&mut self, text: &str) {
        for conn in self.engine.connections() {
            if self.engine.is_websocket(conn) {
                self.engine.send_websocket_text(conn, text);
            }
        }
    }

    fn accept(&mut self, listener: ConnId, conn: ConnId) {
        let Some(factory) = self.factories.get(&listener) else {
            // Listener was bound outside the manager; nothing to run on it.
            self.engine.close(conn);
            return;
        };
        let mode = self
            .contexts
            .get(&listener)
            .map(ConnectionContext::mode)
            .unwrap_or(DispatchMode::Http);

        let mut ctx = ConnectionContext::new(conn, factory.create(), mode);
        match ctx.start() {
            Ok(()) => {
                self.contexts.insert(conn, ctx);
            }
            Err(trace) => {
                error!(conn = %conn, "handler fault before first suspension: {trace}");
                self.engine.close(conn);
            }
        }
    }
}
