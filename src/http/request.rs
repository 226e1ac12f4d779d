use bytes::Bytes;
use std::collections::HashMap;

use crate::engine::ConnId;

/// A raw HTTP message as parsed by the engine, before it is turned into the
/// structured event a handler sees.
///
/// Headers are kept as `(name, value)` pairs in arrival order, duplicates
/// included; the merge into scalar-or-sequence values happens in
/// [`build_http_request`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawRequest {
    /// The HTTP method verbatim (e.g. "GET")
    pub method: String,
    /// Request path without the query string (e.g. "/index.html")
    pub uri: String,
    /// Query string without the leading '?', empty if absent
    pub query_string: String,
    /// Protocol version verbatim (e.g. "HTTP/1.1")
    pub protocol: String,
    /// Headers in arrival order, duplicate names preserved
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Bytes,
}

/// A header value in the structured request: a single string until a second
/// occurrence of the same name promotes it to an ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Single(String),
    Multi(Vec<String>),
}

impl HeaderValue {
    fn push(&mut self, value: String) {
        match self {
            HeaderValue::Single(first) => {
                *self = HeaderValue::Multi(vec![std::mem::take(first), value]);
            }
            HeaderValue::Multi(values) => values.push(value),
        }
    }
}

/// The structured HTTP request event delivered to a handler on resume.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub uri: String,
    pub query_string: String,
    pub protocol: String,
    pub headers: HashMap<String, HeaderValue>,
    pub body: Bytes,
    /// Back-reference to the connection the request arrived on
    pub connection: ConnId,
}

impl HttpRequest {
    /// Looks up a header by exact, case-sensitive name.
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }
}

/// Builds the structured request event from a raw parsed message.
///
/// Pure transform, no side effects beyond allocation. Header merge rule: the
/// first occurrence of a name stores a single string; a second occurrence
/// replaces it with a two-element sequence in arrival order; further
/// occurrences append. Names are compared case-sensitively.
pub fn build_http_request(raw: &RawRequest, connection: ConnId) -> HttpRequest {
    let mut headers: HashMap<String, HeaderValue> = HashMap::with_capacity(raw.headers.len());
    for (name, value) in &raw.headers {
        match headers.get_mut(name) {
            Some(existing) => existing.push(value.clone()),
            None => {
                headers.insert(name.clone(), HeaderValue::Single(value.clone()));
            }
        }
    }

    HttpRequest {
        method: raw.method.clone(),
        uri: raw.uri.clone(),
        query_string: raw.query_string.clone(),
        protocol: raw.protocol.clone(),
        headers,
        body: raw.body.clone(),
        connection,
    }
}
