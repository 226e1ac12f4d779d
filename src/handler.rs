//! Suspendable per-connection handlers.
//!
//! A handler is the long-lived execution context driving one connection's
//! application logic. The event loop resumes it with an [`EventValue`] and it
//! runs until it either suspends again (awaiting the next event), finishes
//! with a final [`Value`], or faults. The suspension is explicit: a handler
//! is an ordinary state object whose [`Handler::resume`] entry point returns a
//! tagged [`HandlerSignal`].

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

use crate::event::EventValue;
use crate::http::request::HttpRequest;

/// A loosely-typed value produced by handler logic.
///
/// Responses are produced by application code the core cannot trust to be
/// well-shaped, so handlers return this dynamic form and the response
/// interpreter validates it at the boundary (see `http::response`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Int(i64),
    Str(String),
    Bytes(Bytes),
    Seq(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    /// Builds a `Value::Map` from key/value pairs.
    pub fn map<K, I>(pairs: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Map lookup; `None` for missing keys and for non-map values.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Value {
        Value::Bytes(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Value {
        Value::Bytes(Bytes::from(b))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::Seq(items)
    }
}

/// The outcome of resuming a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerSignal {
    /// The handler parked at a suspension point awaiting the next event
    Suspended,
    /// The handler reached its terminal point and produced a final value
    Finished(Value),
    /// The handler raised an unrecoverable condition; `trace` is its
    /// stack-trace equivalent
    Faulted { trace: String },
}

/// A resumable unit of per-connection logic.
///
/// A handler never runs concurrently with another dispatch for the same
/// connection: the event loop resumes it strictly once per delivered event and
/// waits for the returned signal. A resume that never returns blocks the whole
/// loop; that fairness constraint is part of the contract.
pub trait Handler {
    fn resume(&mut self, event: EventValue) -> HandlerSignal;
}

/// Creates one handler instance per connection at bind/accept time.
pub trait HandlerFactory {
    fn create(&self) -> Box<dyn Handler>;
}

impl<F, H> HandlerFactory for F
where
    F: Fn() -> H,
    H: Handler + 'static,
{
    fn create(&self) -> Box<dyn Handler> {
        Box::new(self())
    }
}

/// A handler that parks until the first HTTP request, computes one response
/// value, and finishes.
///
/// This is the explicit-continuation form of the most common handler shape:
/// the captured closure is the state carried across the suspension point.
pub struct RespondOnce<F> {
    respond: Option<F>,
}

impl<F> RespondOnce<F>
where
    F: FnOnce(&HttpRequest) -> Value,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond: Some(respond),
        }
    }
}

impl<F> Handler for RespondOnce<F>
where
    F: FnOnce(&HttpRequest) -> Value,
{
    fn resume(&mut self, event: EventValue) -> HandlerSignal {
        match event {
            EventValue::Connected { .. } | EventValue::WebSocket(_) => HandlerSignal::Suspended,
            EventValue::HttpRequest(request) => match self.respond.take() {
                Some(respond) => HandlerSignal::Finished(respond(&request)),
                None => HandlerSignal::Faulted {
                    trace: "handler resumed after completion".to_string(),
                },
            },
        }
    }
}
