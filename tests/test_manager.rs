mod common;

use common::{FakeEngine, RecordingFiles, raw_get, scripted};
use filament::engine::{ConnId, EngineEvent, PollEvent};
use filament::handler::{HandlerSignal, RespondOnce, Value};
use filament::manager::{BindError, Manager};

#[test]
fn test_bind_failure_carries_engine_reason() {
    let mut engine = FakeEngine::new();
    engine.bind_failure = Some("address in use".to_string());
    let mut manager = Manager::with_parts(engine, RecordingFiles::new());

    let err = manager
        .bind_http("127.0.0.1:80", || RespondOnce::new(|_| Value::Nil))
        .unwrap_err();

    let BindError::Address { address, reason } = &err else {
        panic!("expected address error, got: {err}");
    };
    assert_eq!(address, "127.0.0.1:80");
    assert_eq!(reason, "address in use");
}

#[test]
fn test_bind_fails_when_handler_faults_before_suspending() {
    let mut manager = Manager::with_parts(FakeEngine::new(), RecordingFiles::new());
    let (factory, _seen) = scripted(vec![HandlerSignal::Faulted {
        trace: "died on connect".to_string(),
    }]);

    let err = manager.bind_http("127.0.0.1:8080", factory).unwrap_err();

    let BindError::Handler { trace, .. } = &err else {
        panic!("expected handler error, got: {err}");
    };
    assert_eq!(trace, "died on connect");
    // The unusable listening connection was torn down.
    assert_eq!(manager.engine().closed.len(), 1);
}

#[test]
fn test_bind_fails_when_handler_finishes_before_suspending() {
    let mut manager = Manager::with_parts(FakeEngine::new(), RecordingFiles::new());
    let (factory, _seen) = scripted(vec![HandlerSignal::Finished(Value::Nil)]);

    let err = manager.bind_http("127.0.0.1:8080", factory).unwrap_err();
    assert!(matches!(err, BindError::Handler { .. }));
}

#[test]
fn test_broadcast_reaches_only_websocket_connections() {
    let mut engine = FakeEngine::new();
    let sockets = [ConnId(10), ConnId(11), ConnId(12), ConnId(13)];
    engine.open = sockets.to_vec();
    // Three upgraded, one still plain HTTP.
    engine.ws_mode = vec![ConnId(10), ConnId(11), ConnId(12)];
    let mut manager = Manager::with_parts(engine, RecordingFiles::new());

    manager.broadcast("hi");

    let frames = &manager.engine().frames;
    assert_eq!(frames.len(), 3);
    for conn in [ConnId(10), ConnId(11), ConnId(12)] {
        assert!(frames.contains(&(conn, "hi".to_string())));
    }
    assert!(!frames.iter().any(|(conn, _)| *conn == ConnId(13)));
}

#[test]
fn test_accept_from_unknown_listener_closes_connection() {
    let mut manager = Manager::with_parts(FakeEngine::new(), RecordingFiles::new());

    let conn = ConnId(100);
    manager.engine_mut().queued = vec![PollEvent::Accepted {
        listener: ConnId(999),
        conn,
    }];
    manager.poll(0);

    assert!(manager.engine().closed.contains(&conn));
}

#[test]
fn test_accepted_handler_fault_closes_connection_and_poll_continues() {
    let mut manager = Manager::with_parts(FakeEngine::new(), RecordingFiles::new());
    // Scripts pop per created handler: the listener's handler suspends
    // normally, the accepted connection's handler faults on Connected.
    let scripts = std::rc::Rc::new(std::cell::RefCell::new(vec![
        vec![HandlerSignal::Faulted {
            trace: "died on connect".to_string(),
        }],
        vec![HandlerSignal::Suspended],
    ]));
    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let factory = {
        let seen = seen.clone();
        move || {
            let script = scripts.borrow_mut().pop().unwrap();
            common::ScriptedHandler::new(script, seen.clone())
        }
    };
    let listener = manager.bind_http("127.0.0.1:8080", factory).unwrap();

    let conn = ConnId(100);
    manager.engine_mut().queued = vec![PollEvent::Accepted { listener, conn }];
    manager.poll(0);

    assert!(manager.engine().closed.contains(&conn));
}

#[test]
fn test_events_for_unknown_connections_are_ignored() {
    let mut manager = Manager::with_parts(FakeEngine::new(), RecordingFiles::new());

    manager.engine_mut().queued = vec![
        PollEvent::Event {
            conn: ConnId(55),
            event: EngineEvent::HttpRequest(raw_get("/", &[])),
        },
        PollEvent::Event {
            conn: ConnId(55),
            event: EngineEvent::Closed,
        },
        PollEvent::Event {
            conn: ConnId(56),
            event: EngineEvent::Other,
        },
    ];
    manager.poll(0);

    assert!(manager.engine().written.is_empty());
}
