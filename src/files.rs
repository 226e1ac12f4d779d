//! The file-serving collaborator.
//!
//! A handler can answer with a serving directive instead of a literal
//! response: serve a directory tree (`kind = static`) or one file
//! (`kind = file`). The core delegates those wholesale; the collaborator
//! owns the complete wire response, status and framing included, and the
//! dispatcher writes the returned bytes verbatim.

use std::fs;
use std::path::{Path, PathBuf};

use crate::http::request::{HeaderValue, RawRequest};
use crate::http::writer;

pub trait FileService {
    /// Serves the file under `root` named by the request path. `None` means
    /// no document root was configured; the collaborator's fallback applies.
    fn serve_static(&mut self, raw: &RawRequest, root: Option<&str>) -> Vec<u8>;

    /// Serves exactly one file with the given MIME type.
    fn serve_file(&mut self, raw: &RawRequest, path: &str, mime: &str) -> Vec<u8>;
}

/// Plain filesystem implementation.
pub struct DiskFiles;

impl DiskFiles {
    pub fn new() -> Self {
        DiskFiles
    }
}

impl Default for DiskFiles {
    fn default() -> Self {
        DiskFiles::new()
    }
}

impl FileService for DiskFiles {
    fn serve_static(&mut self, raw: &RawRequest, root: Option<&str>) -> Vec<u8> {
        let Some(root) = root else {
            return error_page(404, "no document root configured");
        };

        let rel = raw.uri.trim_start_matches('/');
        let rel = if rel.is_empty() { "index.html" } else { rel };
        if rel.split('/').any(|segment| segment == "..") {
            return error_page(400, "Bad Request");
        }

        let mut path = PathBuf::from(root).join(rel);
        if path.is_dir() {
            path.push("index.html");
        }

        match fs::read(&path) {
            Ok(body) => file_response(&body, mime_for(&path)),
            Err(_) => error_page(404, "Not Found"),
        }
    }

    fn serve_file(&mut self, _raw: &RawRequest, path: &str, mime: &str) -> Vec<u8> {
        match fs::read(path) {
            Ok(body) => file_response(&body, mime),
            Err(_) => error_page(404, "Not Found"),
        }
    }
}

fn file_response(body: &[u8], mime: &str) -> Vec<u8> {
    let headers = vec![(
        "Content-Type".to_string(),
        HeaderValue::Single(mime.to_string()),
    )];
    writer::serialize(200, &headers, body)
}

fn error_page(status: i64, message: &str) -> Vec<u8> {
    writer::serialize(status, &[], message.as_bytes())
}

/// MIME type from the file extension; octet-stream when unrecognized.
fn mime_for(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
