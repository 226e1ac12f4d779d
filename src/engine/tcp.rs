use bytes::Bytes;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::engine::parser::{self, ParseError};
use crate::engine::ws;
use crate::engine::{ConnId, Engine, EngineEvent, PollEvent};
use crate::http::request::RawRequest;
use crate::http::writer;

/// Ceiling on buffered bytes awaiting a complete request parse: the declared
/// body limit plus room for headers.
const MAX_BUFFERED: usize = parser::MAX_BODY_LEN + 64 * 1024;

/// The default engine: non-blocking TCP sockets swept from a single thread.
///
/// Every socket is non-blocking; `poll` sweeps them all, moving buffered
/// bytes in both directions and parsing whatever is complete. Output is
/// always buffered first, so `write` never blocks and never fails; a dead
/// socket is discovered on the next sweep and reported as a `Closed` event.
///
/// Listeners with WebSocket support enabled answer upgrade handshakes
/// themselves and switch the connection to frame parsing; the upgrade request
/// is reported as `WebSocketHandshakeDone` rather than `HttpRequest`.
pub struct TcpEngine {
    listeners: HashMap<ConnId, Listener>,
    streams: HashMap<ConnId, Stream>,
    next_id: u64,
}

struct Listener {
    socket: TcpListener,
    ws_enabled: bool,
}

struct Stream {
    socket: TcpStream,
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
    close_after_send: bool,
    /// Inherited from the listener: upgrade handshakes allowed
    ws_capable: bool,
    /// Upgrade completed; the stream now carries frames, not requests
    websocket: bool,
}

impl TcpEngine {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            streams: HashMap::new(),
            next_id: 1,
        }
    }

    /// The locally bound address of a listener (useful with port 0).
    pub fn local_addr(&self, conn: ConnId) -> Option<SocketAddr> {
        if let Some(l) = self.listeners.get(&conn) {
            return l.socket.local_addr().ok();
        }
        self.streams.get(&conn)?.socket.local_addr().ok()
    }

    /// One pass over every socket: accept, flush, read, parse.
    fn sweep(&mut self) -> Vec<PollEvent> {
        let mut events = Vec::new();

        for (&listener_id, listener) in self.listeners.iter() {
            loop {
                match listener.socket.accept() {
                    Ok((socket, peer)) => {
                        if let Err(e) = socket.set_nonblocking(true) {
                            warn!("could not configure accepted socket from {peer}: {e}");
                            continue;
                        }
                        let conn = ConnId(self.next_id);
                        self.next_id += 1;
                        self.streams.insert(
                            conn,
                            Stream {
                                socket,
                                read_buf: Vec::with_capacity(4096),
                                write_buf: Vec::new(),
                                close_after_send: false,
                                ws_capable: listener.ws_enabled,
                                websocket: false,
                            },
                        );
                        debug!(conn = %conn, "accepted connection from {peer}");
                        events.push(PollEvent::Accepted {
                            listener: listener_id,
                            conn,
                        });
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        warn!(conn = %listener_id, "accept error: {e}");
                        break;
                    }
                }
            }
        }

        let mut dead = Vec::new();
        for (&id, s) in self.streams.iter_mut() {
            if let Err(e) = s.flush_pending() {
                debug!(conn = %id, "write error: {e}");
                events.push(closed(id));
                dead.push(id);
                continue;
            }
            if s.close_after_send && s.write_buf.is_empty() {
                events.push(closed(id));
                dead.push(id);
                continue;
            }

            let eof = match s.fill() {
                Ok(eof) => eof,
                Err(e) => {
                    debug!(conn = %id, "read error: {e}");
                    events.push(closed(id));
                    dead.push(id);
                    continue;
                }
            };

            let stream_ok = if s.websocket {
                s.parse_frames(id, &mut events)
            } else {
                s.parse_requests(id, &mut events)
            };
            if !stream_ok || eof {
                events.push(closed(id));
                dead.push(id);
            }
        }
        for id in dead {
            self.streams.remove(&id);
        }

        events
    }
}

impl Default for TcpEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn closed(conn: ConnId) -> PollEvent {
    PollEvent::Event {
        conn,
        event: EngineEvent::Closed,
    }
}

impl Engine for TcpEngine {
    fn bind(&mut self, address: &str) -> Result<ConnId, String> {
        let socket = TcpListener::bind(address).map_err(|e| e.to_string())?;
        socket.set_nonblocking(true).map_err(|e| e.to_string())?;
        let conn = ConnId(self.next_id);
        self.next_id += 1;
        self.listeners.insert(
            conn,
            Listener {
                socket,
                ws_enabled: false,
            },
        );
        info!(conn = %conn, "bound listener on {address}");
        Ok(conn)
    }

    fn poll(&mut self, timeout: Duration) -> Vec<PollEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let events = self.sweep();
            if !events.is_empty() {
                return events;
            }
            let now = Instant::now();
            if now >= deadline {
                return events;
            }
            thread::sleep(Duration::from_millis(1).min(deadline - now));
        }
    }

    fn write(&mut self, conn: ConnId, bytes: &[u8]) {
        if let Some(s) = self.streams.get_mut(&conn) {
            s.write_buf.extend_from_slice(bytes);
        }
    }

    fn close_after_send(&mut self, conn: ConnId) {
        if let Some(s) = self.streams.get_mut(&conn) {
            s.close_after_send = true;
        }
    }

    fn close(&mut self, conn: ConnId) {
        self.listeners.remove(&conn);
        self.streams.remove(&conn);
    }

    fn enable_websocket(&mut self, conn: ConnId) {
        if let Some(l) = self.listeners.get_mut(&conn) {
            l.ws_enabled = true;
        } else if let Some(s) = self.streams.get_mut(&conn) {
            s.ws_capable = true;
        }
    }

    fn is_websocket(&self, conn: ConnId) -> bool {
        self.streams.get(&conn).is_some_and(|s| s.websocket)
    }

    fn connections(&self) -> Vec<ConnId> {
        let mut conns: Vec<ConnId> = self.streams.keys().copied().collect();
        conns.sort();
        conns
    }

    fn send_websocket_text(&mut self, conn: ConnId, text: &str) {
        if let Some(s) = self.streams.get_mut(&conn) {
            s.write_buf
                .extend_from_slice(&ws::encode_frame(ws::OP_TEXT, text.as_bytes()));
        }
    }
}

impl Stream {
    /// Writes as much buffered output as the socket will take.
    fn flush_pending(&mut self) -> io::Result<()> {
        while !self.write_buf.is_empty() {
            match self.socket.write(&self.write_buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connection closed while writing",
                    ));
                }
                Ok(n) => {
                    self.write_buf.drain(..n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Reads everything currently available. Returns true on EOF.
    fn fill(&mut self) -> io::Result<bool> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.socket.read(&mut chunk) {
                Ok(0) => return Ok(true),
                Ok(n) => self.read_buf.extend_from_slice(&chunk[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Parses complete requests out of the read buffer. Returns false when
    /// the stream is beyond recovery and must be dropped.
    fn parse_requests(&mut self, id: ConnId, events: &mut Vec<PollEvent>) -> bool {
        loop {
            match parser::parse_request(&self.read_buf) {
                Ok((raw, consumed)) => {
                    self.read_buf.drain(..consumed);
                    if self.ws_capable && wants_upgrade(&raw) {
                        match upgrade_key(&raw) {
                            Some(key) => {
                                self.write_buf.extend_from_slice(&ws::handshake_response(&key));
                                self.websocket = true;
                                events.push(PollEvent::Event {
                                    conn: id,
                                    event: EngineEvent::WebSocketHandshakeDone,
                                });
                                // Whatever follows is frames; picked up next sweep.
                                return true;
                            }
                            None => {
                                self.write_buf
                                    .extend_from_slice(&writer::serialize(400, &[], b""));
                                self.close_after_send = true;
                                return true;
                            }
                        }
                    }
                    events.push(PollEvent::Event {
                        conn: id,
                        event: EngineEvent::HttpRequest(raw),
                    });
                }
                Err(ParseError::Incomplete) => {
                    if self.read_buf.len() > MAX_BUFFERED {
                        warn!(conn = %id, "request exceeds buffer limit, rejecting");
                        self.write_buf
                            .extend_from_slice(&writer::serialize(413, &[], b""));
                        self.close_after_send = true;
                    }
                    return true;
                }
                Err(e) => {
                    warn!(conn = %id, "unparsable request: {e:?}");
                    self.write_buf
                        .extend_from_slice(&writer::serialize(400, &[], b""));
                    self.close_after_send = true;
                    return true;
                }
            }
        }
    }

    /// Parses complete WebSocket frames out of the read buffer. Returns false
    /// when the stream violated the protocol and must be dropped.
    fn parse_frames(&mut self, id: ConnId, events: &mut Vec<PollEvent>) -> bool {
        loop {
            match ws::decode_frame(&self.read_buf) {
                Ok(Some((frame, consumed))) => {
                    self.read_buf.drain(..consumed);
                    match frame.opcode {
                        ws::OP_TEXT | ws::OP_BINARY => events.push(PollEvent::Event {
                            conn: id,
                            event: EngineEvent::WebSocketFrame(Bytes::from(frame.payload)),
                        }),
                        ws::OP_PING => {
                            self.write_buf
                                .extend_from_slice(&ws::encode_frame(ws::OP_PONG, &frame.payload));
                        }
                        ws::OP_CLOSE => {
                            self.write_buf
                                .extend_from_slice(&ws::encode_frame(ws::OP_CLOSE, &frame.payload));
                            self.close_after_send = true;
                            return true;
                        }
                        _ => {}
                    }
                }
                Ok(None) => return true,
                Err(reason) => {
                    warn!(conn = %id, "websocket protocol error: {reason}");
                    return false;
                }
            }
        }
    }
}

fn wants_upgrade(raw: &RawRequest) -> bool {
    raw.headers.iter().any(|(name, value)| {
        name.eq_ignore_ascii_case("Upgrade") && value.eq_ignore_ascii_case("websocket")
    })
}

fn upgrade_key(raw: &RawRequest) -> Option<String> {
    raw.headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("Sec-WebSocket-Key"))
        .map(|(_, value)| value.clone())
}
