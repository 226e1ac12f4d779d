#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use filament::engine::{ConnId, Engine, PollEvent};
use filament::event::EventValue;
use filament::files::FileService;
use filament::handler::{Handler, HandlerSignal};
use filament::http::request::RawRequest;

/// In-memory engine double: events are queued by the test and drained by
/// `poll`; everything the core asks the engine to do is recorded.
pub struct FakeEngine {
    pub queued: Vec<PollEvent>,
    pub written: HashMap<ConnId, Vec<u8>>,
    pub close_after_send: Vec<ConnId>,
    pub closed: Vec<ConnId>,
    pub ws_enabled: Vec<ConnId>,
    pub ws_mode: Vec<ConnId>,
    pub open: Vec<ConnId>,
    pub frames: Vec<(ConnId, String)>,
    pub bind_failure: Option<String>,
    next_id: u64,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            queued: Vec::new(),
            written: HashMap::new(),
            close_after_send: Vec::new(),
            closed: Vec::new(),
            ws_enabled: Vec::new(),
            ws_mode: Vec::new(),
            open: Vec::new(),
            frames: Vec::new(),
            bind_failure: None,
            next_id: 1,
        }
    }

    pub fn written_to(&self, conn: ConnId) -> &[u8] {
        self.written.get(&conn).map(Vec::as_slice).unwrap_or(b"")
    }
}

impl Engine for FakeEngine {
    fn bind(&mut self, _address: &str) -> Result<ConnId, String> {
        if let Some(reason) = &self.bind_failure {
            return Err(reason.clone());
        }
        let conn = ConnId(self.next_id);
        self.next_id += 1;
        Ok(conn)
    }

    fn poll(&mut self, _timeout: Duration) -> Vec<PollEvent> {
        std::mem::take(&mut self.queued)
    }

    fn write(&mut self, conn: ConnId, bytes: &[u8]) {
        self.written.entry(conn).or_default().extend_from_slice(bytes);
    }

    fn close_after_send(&mut self, conn: ConnId) {
        self.close_after_send.push(conn);
    }

    fn close(&mut self, conn: ConnId) {
        self.closed.push(conn);
        self.open.retain(|c| *c != conn);
    }

    fn enable_websocket(&mut self, conn: ConnId) {
        self.ws_enabled.push(conn);
    }

    fn is_websocket(&self, conn: ConnId) -> bool {
        self.ws_mode.contains(&conn)
    }

    fn connections(&self) -> Vec<ConnId> {
        self.open.clone()
    }

    fn send_websocket_text(&mut self, conn: ConnId, text: &str) {
        self.frames.push((conn, text.to_string()));
    }
}

/// File-serving double: records delegations and answers with marker bytes.
pub struct RecordingFiles {
    pub static_calls: Vec<(String, Option<String>)>,
    pub file_calls: Vec<(String, String)>,
}

impl RecordingFiles {
    pub fn new() -> Self {
        Self {
            static_calls: Vec::new(),
            file_calls: Vec::new(),
        }
    }
}

impl FileService for RecordingFiles {
    fn serve_static(&mut self, raw: &RawRequest, root: Option<&str>) -> Vec<u8> {
        self.static_calls
            .push((raw.uri.clone(), root.map(str::to_string)));
        b"<static>".to_vec()
    }

    fn serve_file(&mut self, _raw: &RawRequest, path: &str, mime: &str) -> Vec<u8> {
        self.file_calls.push((path.to_string(), mime.to_string()));
        b"<file>".to_vec()
    }
}

/// Handler double that records every event it is resumed with and plays back
/// a script of signals, one per resume (the `Connected` resume included).
/// An exhausted script keeps suspending.
pub struct ScriptedHandler {
    script: VecDeque<HandlerSignal>,
    seen: Rc<RefCell<Vec<EventValue>>>,
}

impl ScriptedHandler {
    pub fn new(script: Vec<HandlerSignal>, seen: Rc<RefCell<Vec<EventValue>>>) -> Self {
        Self {
            script: script.into(),
            seen,
        }
    }
}

impl Handler for ScriptedHandler {
    fn resume(&mut self, event: EventValue) -> HandlerSignal {
        self.seen.borrow_mut().push(event);
        self.script.pop_front().unwrap_or(HandlerSignal::Suspended)
    }
}

/// Factory plus shared event log for a scripted handler; every created
/// handler replays the same script.
pub fn scripted(
    script: Vec<HandlerSignal>,
) -> (impl Fn() -> ScriptedHandler, Rc<RefCell<Vec<EventValue>>>) {
    let seen: Rc<RefCell<Vec<EventValue>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_for_factory = seen.clone();
    let factory = move || ScriptedHandler::new(script.clone(), seen_for_factory.clone());
    (factory, seen)
}

/// A raw GET with the given path and headers.
pub fn raw_get(uri: &str, headers: &[(&str, &str)]) -> RawRequest {
    RawRequest {
        method: "GET".to_string(),
        uri: uri.to_string(),
        query_string: String::new(),
        protocol: "HTTP/1.1".to_string(),
        headers: headers
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect(),
        body: Bytes::new(),
    }
}
