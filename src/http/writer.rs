use crate::http::request::HeaderValue;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Serializes a generic response to wire bytes: status line, one line per
/// header value (multi-valued headers repeat the name), a computed
/// `Content-Length`, the blank-line terminator, then the body.
pub fn serialize(status: i64, headers: &[(String, HeaderValue)], body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + body.len());

    let status_line = format!("{} {} {}\r\n", HTTP_VERSION, status, reason_phrase(status));
    buf.extend_from_slice(status_line.as_bytes());

    for (name, value) in headers {
        match value {
            HeaderValue::Single(v) => header_line(&mut buf, name, v),
            HeaderValue::Multi(values) => {
                for v in values {
                    header_line(&mut buf, name, v);
                }
            }
        }
    }

    buf.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(body);

    buf
}

/// The fixed 500 fallback: empty body, nothing else. The last line of defense
/// against malformed handler output; must never fail to serialize.
pub fn fallback() -> Vec<u8> {
    serialize(500, &[], b"")
}

/// A 500 fallback carrying a diagnostic body describing the bad shape.
pub fn fallback_with(diagnostic: &str) -> Vec<u8> {
    serialize(500, &[], diagnostic.as_bytes())
}

fn header_line(buf: &mut Vec<u8>, name: &str, value: &str) {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

/// Standard reason phrase for common status codes; handlers may emit any
/// integer, so unknown codes get a generic phrase.
pub fn reason_phrase(status: i64) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
