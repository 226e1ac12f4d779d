mod common;

use std::fs;
use std::path::PathBuf;

use common::raw_get;
use filament::files::{DiskFiles, FileService};

fn temp_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("filament-files-{}-{name}", std::process::id()));
    fs::create_dir_all(&root).unwrap();
    root
}

#[test]
fn test_static_without_root_is_404() {
    let mut files = DiskFiles::new();

    let text = String::from_utf8(files.serve_static(&raw_get("/index.html", &[]), None)).unwrap();

    assert!(text.starts_with("HTTP/1.1 404"), "got: {text}");
    assert!(text.ends_with("no document root configured"));
}

#[test]
fn test_static_serves_file_with_mime_from_extension() {
    let root = temp_root("mime");
    fs::write(root.join("app.json"), b"{}").unwrap();
    let mut files = DiskFiles::new();

    let text = String::from_utf8(
        files.serve_static(&raw_get("/app.json", &[]), Some(root.to_str().unwrap())),
    )
    .unwrap();

    assert!(text.starts_with("HTTP/1.1 200"), "got: {text}");
    assert!(text.contains("Content-Type: application/json\r\n"));
    assert!(text.ends_with("{}"));
}

#[test]
fn test_static_defaults_to_index_html() {
    let root = temp_root("index");
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("index.html"), b"<html>home</html>").unwrap();
    fs::write(root.join("sub/index.html"), b"<html>sub</html>").unwrap();
    let mut files = DiskFiles::new();
    let root_str = root.to_str().unwrap();

    // Bare "/" maps to the root index.
    let text = String::from_utf8(files.serve_static(&raw_get("/", &[]), Some(root_str))).unwrap();
    assert!(text.starts_with("HTTP/1.1 200"), "got: {text}");
    assert!(text.contains("Content-Type: text/html\r\n"));
    assert!(text.ends_with("home</html>"));

    // A directory path maps to its own index.
    let text =
        String::from_utf8(files.serve_static(&raw_get("/sub", &[]), Some(root_str))).unwrap();
    assert!(text.starts_with("HTTP/1.1 200"), "got: {text}");
    assert!(text.ends_with("sub</html>"));
}

#[test]
fn test_static_rejects_parent_traversal() {
    let root = temp_root("traversal");
    let mut files = DiskFiles::new();

    let text = String::from_utf8(
        files.serve_static(
            &raw_get("/../etc/passwd", &[]),
            Some(root.to_str().unwrap()),
        ),
    )
    .unwrap();

    assert!(text.starts_with("HTTP/1.1 400"), "got: {text}");
}

#[test]
fn test_static_missing_file_is_404() {
    let root = temp_root("missing");
    let mut files = DiskFiles::new();

    let text = String::from_utf8(
        files.serve_static(&raw_get("/nope.txt", &[]), Some(root.to_str().unwrap())),
    )
    .unwrap();

    assert!(text.starts_with("HTTP/1.1 404"), "got: {text}");
    assert!(text.ends_with("Not Found"));
}

#[test]
fn test_file_serves_with_given_mime() {
    let root = temp_root("file");
    let path = root.join("report.txt");
    fs::write(&path, b"quarterly numbers").unwrap();
    let mut files = DiskFiles::new();

    let text = String::from_utf8(files.serve_file(
        &raw_get("/", &[]),
        path.to_str().unwrap(),
        "text/x-report",
    ))
    .unwrap();

    assert!(text.starts_with("HTTP/1.1 200"), "got: {text}");
    assert!(text.contains("Content-Type: text/x-report\r\n"));
    assert!(text.ends_with("quarterly numbers"));
}

#[test]
fn test_file_missing_path_is_404() {
    let root = temp_root("file-missing");
    let path = root.join("not-there.txt");
    let mut files = DiskFiles::new();

    let text = String::from_utf8(files.serve_file(
        &raw_get("/", &[]),
        path.to_str().unwrap(),
        "text/plain",
    ))
    .unwrap();

    assert!(text.starts_with("HTTP/1.1 404"), "got: {text}");
}
