//! File extension → MIME type lookup.

use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

const TABLE: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("mjs", "text/javascript"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("xml", "application/xml"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("wasm", "application/wasm"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("webp", "image/webp"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("mp4", "video/mp4"),
    ("mp3", "audio/mpeg"),
];

/// MIME type for a file name, `application/octet-stream` when unknown.
pub fn from_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| {
            TABLE
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(ext))
                .map(|(_, mime)| *mime)
        })
        .unwrap_or(OCTET_STREAM)
}

/// `text/html; charset=utf-8` → `text/html`.
pub fn essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}

pub fn is_text(mime: &str) -> bool {
    let essence = essence(mime);
    essence.starts_with("text/")
        || matches!(essence, "application/json" | "application/xml" | "image/svg+xml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(from_path(Path::new("a/b/Report.PDF")), "application/pdf");
        assert_eq!(from_path(Path::new("index.html")), "text/html");
        assert_eq!(from_path(Path::new("blob.unknown")), OCTET_STREAM);
        assert_eq!(from_path(Path::new("noext")), OCTET_STREAM);
    }

    #[test]
    fn test_essence() {
        assert_eq!(essence("text/html; charset=utf-8"), "text/html");
        assert!(is_text("text/css"));
        assert!(!is_text("image/png"));
    }
}
