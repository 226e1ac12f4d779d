use bytes::Bytes;
use thiserror::Error;

use crate::handler::Value;
use crate::http::request::HeaderValue;

/// A validated response, converted from the loosely-typed value a handler
/// finished with.
///
/// The closed set of variants replaces runtime shape dispatch: anything a
/// handler can legally ask for is one of these, and everything else is
/// rejected as a [`ShapeError`] at conversion time.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// An ordinary status/headers/body response written by the core
    Generic {
        status: i64,
        headers: Vec<(String, HeaderValue)>,
        body: Bytes,
    },
    /// Serve files under a document root, delegated to the file-serving
    /// collaborator; `None` means no root was configured
    ServeStatic { root: Option<String> },
    /// Serve exactly one file with the given MIME type
    ServeFile { path: String, mime: String },
}

/// Why a handler value could not be honored as a response.
///
/// These never propagate: the dispatcher downgrades every variant to a fixed
/// 500 response. The distinction only controls whether the 500 carries a
/// diagnostic body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("response value is not a mapping")]
    NotAMapping,
    #[error("expected string file value to serve a file")]
    BadFilePath,
    #[error("status must be nil or an integer")]
    BadStatus,
    #[error("headers must be nil or a mapping")]
    BadHeaders,
    #[error("body must be nil, a string, or bytes")]
    BadBody,
}

impl Response {
    /// Interprets a handler's final value.
    ///
    /// Priority order: a mapping with `kind = "static"` or `kind = "file"` is
    /// a serving directive; any other mapping is the generic shape with
    /// optional `status` (default 200), `headers`, and `body`; any non-mapping
    /// value is malformed. Unrecognized `kind` strings fall through to the
    /// generic shape.
    pub fn from_value(value: &Value) -> Result<Response, ShapeError> {
        let Value::Map(_) = value else {
            return Err(ShapeError::NotAMapping);
        };

        if let Some(kind) = value.get("kind").and_then(Value::as_str) {
            match kind {
                "static" => {
                    let root = value
                        .get("root")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    return Ok(Response::ServeStatic { root });
                }
                "file" => {
                    let Some(path) = value.get("file").and_then(Value::as_str) else {
                        return Err(ShapeError::BadFilePath);
                    };
                    let mime = value
                        .get("mime")
                        .and_then(Value::as_str)
                        .unwrap_or("text/plain");
                    return Ok(Response::ServeFile {
                        path: path.to_string(),
                        mime: mime.to_string(),
                    });
                }
                _ => {}
            }
        }

        let status = match value.get("status") {
            None | Some(Value::Nil) => 200,
            Some(Value::Int(code)) => *code,
            Some(_) => return Err(ShapeError::BadStatus),
        };

        let headers = match value.get("headers") {
            None | Some(Value::Nil) => Vec::new(),
            Some(Value::Map(entries)) => entries
                .iter()
                .map(|(name, v)| (name.clone(), header_value(v)))
                .collect(),
            Some(_) => return Err(ShapeError::BadHeaders),
        };

        let body = match value.get("body") {
            None | Some(Value::Nil) => Bytes::new(),
            Some(Value::Bytes(b)) => b.clone(),
            Some(Value::Str(s)) => Bytes::copy_from_slice(s.as_bytes()),
            Some(_) => return Err(ShapeError::BadBody),
        };

        Ok(Response::Generic {
            status,
            headers,
            body,
        })
    }
}

/// A sequence becomes a multi-valued header (one line per element on the
/// wire); anything else is stringified into a single value.
fn header_value(v: &Value) -> HeaderValue {
    match v {
        Value::Seq(items) => HeaderValue::Multi(items.iter().map(Value::to_string).collect()),
        other => HeaderValue::Single(other.to_string()),
    }
}
