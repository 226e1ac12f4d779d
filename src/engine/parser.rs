use bytes::Bytes;

use crate::http::request::RawRequest;

/// Largest declared `Content-Length` accepted; anything beyond is rejected
/// up front instead of being buffered while the body trickles in.
pub const MAX_BODY_LEN: usize = 10 * 1024 * 1024;

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    InvalidRequest,
    InvalidHeader,
    InvalidContentLength,
    Incomplete,
}

/// Parses one HTTP/1.1 request from the front of `buf`.
///
/// Returns the raw message and the number of bytes consumed so the caller can
/// drain its read buffer. `Incomplete` means more bytes are needed; any other
/// error means the stream is unrecoverable.
pub fn parse_request(buf: &[u8]) -> Result<(RawRequest, usize), ParseError> {
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let header_bytes = &buf[..headers_end];
    let body_bytes = &buf[headers_end + 4..];

    let headers_str = std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let protocol = parts.next().ok_or(ParseError::InvalidRequest)?;

    // Path and query split at the first '?'
    let (uri, query_string) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };

    // Headers, arrival order, duplicates preserved
    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let content_length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("Content-Length"))
        .map(|(_, value)| {
            value
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidContentLength)
        })
        .transpose()?
        .unwrap_or(0);

    if content_length > MAX_BODY_LEN {
        return Err(ParseError::InvalidContentLength);
    }

    if body_bytes.len() < content_length {
        return Err(ParseError::Incomplete);
    }

    let request = RawRequest {
        method: method.to_string(),
        uri: uri.to_string(),
        query_string: query_string.to_string(),
        protocol: protocol.to_string(),
        headers,
        body: Bytes::copy_from_slice(&body_bytes[..content_length]),
    };

    let total_consumed = headers_end + 4 + content_length;
    Ok((request, total_consumed))
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
