//! Minimal RFC 6455 framing for the default engine: the server side of the
//! upgrade handshake, frame encoding (server frames are never masked), and
//! decoding of masked client frames.

use base64::Engine as _;
use sha1::{Digest, Sha1};

pub const OP_TEXT: u8 = 0x1;
pub const OP_BINARY: u8 = 0x2;
pub const OP_CLOSE: u8 = 0x8;
pub const OP_PING: u8 = 0x9;
pub const OP_PONG: u8 = 0xA;

const ACCEPT_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Upper bound on a single frame's payload. Larger claims are protocol
/// errors, which also bounds how much a peer can force into the read buffer
/// while a frame is still incomplete.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Derives the `Sec-WebSocket-Accept` value for a client's key.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(ACCEPT_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// The complete 101 Switching Protocols response for an upgrade request.
pub fn handshake_response(client_key: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        accept_key(client_key)
    )
    .into_bytes()
}

/// Encodes one server-to-client frame (FIN set, unmasked).
pub fn encode_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 10);
    frame.push(0x80 | (opcode & 0x0f));

    let len = payload.len();
    if len <= 125 {
        frame.push(len as u8);
    } else if len <= 65535 {
        frame.push(126);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        frame.push(127);
        frame.extend_from_slice(&(len as u64).to_be_bytes());
    }

    frame.extend_from_slice(payload);
    frame
}

#[derive(Debug, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub fin: bool,
    pub payload: Vec<u8>,
}

/// Decodes one client frame from the front of `buf`.
///
/// `Ok(None)` means the buffer does not yet hold a whole frame. Client frames
/// must be masked, and may claim at most [`MAX_FRAME_LEN`] payload bytes; an
/// unmasked or oversized frame is a protocol error and the connection should
/// be dropped.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, &'static str> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let fin = buf[0] & 0x80 != 0;
    let opcode = buf[0] & 0x0f;
    let masked = buf[1] & 0x80 != 0;
    let mut len = (buf[1] & 0x7f) as u64;
    let mut offset = 2usize;

    if len == 126 {
        if buf.len() < offset + 2 {
            return Ok(None);
        }
        len = u16::from_be_bytes([buf[offset], buf[offset + 1]]) as u64;
        offset += 2;
    } else if len == 127 {
        if buf.len() < offset + 8 {
            return Ok(None);
        }
        let mut ext = [0u8; 8];
        ext.copy_from_slice(&buf[offset..offset + 8]);
        len = u64::from_be_bytes(ext);
        offset += 8;
    }

    if !masked {
        return Err("unmasked client frame");
    }
    if buf.len() < offset + 4 {
        return Ok(None);
    }
    let mask = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
    offset += 4;

    if len > MAX_FRAME_LEN as u64 {
        return Err("frame too large");
    }
    let len = len as usize;
    let end = offset.checked_add(len).ok_or("frame too large")?;
    if buf.len() < end {
        return Ok(None);
    }

    let mut payload = buf[offset..end].to_vec();
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }

    Ok(Some((
        Frame {
            opcode,
            fin,
            payload,
        },
        end,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_rfc_vector() {
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn encodes_short_text_frame() {
        assert_eq!(encode_frame(OP_TEXT, b"hi"), vec![0x81, 0x02, b'h', b'i']);
    }

    #[test]
    fn encodes_extended_length() {
        let payload = vec![0u8; 300];
        let frame = encode_frame(OP_BINARY, &payload);
        assert_eq!(&frame[..4], &[0x82, 126, 0x01, 0x2c]);
        assert_eq!(frame.len(), 4 + 300);
    }

    #[test]
    fn decodes_masked_client_frame() {
        // "hi" masked with [1, 2, 3, 4]
        let frame = vec![0x81, 0x82, 1, 2, 3, 4, b'h' ^ 1, b'i' ^ 2];

        let (decoded, consumed) = decode_frame(&frame).unwrap().unwrap();

        assert_eq!(consumed, frame.len());
        assert_eq!(decoded.opcode, OP_TEXT);
        assert!(decoded.fin);
        assert_eq!(decoded.payload, b"hi");
    }

    #[test]
    fn partial_frame_is_not_an_error() {
        let frame = vec![0x81, 0x82, 1, 2];
        assert_eq!(decode_frame(&frame).unwrap(), None);
    }

    #[test]
    fn huge_claimed_length_is_a_protocol_error() {
        let mut frame = vec![0x81, 0xFF];
        frame.extend_from_slice(&u64::MAX.to_be_bytes());
        frame.extend_from_slice(&[1, 2, 3, 4]);
        assert_eq!(decode_frame(&frame), Err("frame too large"));
    }

    #[test]
    fn length_over_cap_is_a_protocol_error() {
        let mut frame = vec![0x81, 0xFF];
        frame.extend_from_slice(&(MAX_FRAME_LEN as u64 + 1).to_be_bytes());
        frame.extend_from_slice(&[1, 2, 3, 4]);
        assert_eq!(decode_frame(&frame), Err("frame too large"));
    }

    #[test]
    fn unmasked_client_frame_is_rejected() {
        let frame = vec![0x81, 0x02, b'h', b'i'];
        assert!(decode_frame(&frame).is_err());
    }
}
