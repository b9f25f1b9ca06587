//! Static file serving rooted at one directory.
//!
//! Paths come straight off the request URI: the querystring is cut,
//! the rest is percent-decoded and checked against a depth rule that
//! refuses any prefix climbing above the root. Small files are read
//! into the response buffer whole; larger ones stream through a body
//! producer that reads as the response drains, so the response never
//! holds more than one window of file content.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use http::StatusCode;
use pocket_http::protocol::{RequestMessage, ResponseMessage};
use tracing::{debug, warn};

use crate::url::url_decode;

/// Files up to this size are buffered instead of streamed.
const MAX_INLINE_FILE: u64 = 4 * 1024;

/// Extension to content-type mapping; unknown extensions fall back to
/// `text/plain`.
fn mime_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        _ => "text/plain",
    }
}

/// Every `..` segment must stay below the depth gained so far, so a
/// path can never resolve above the root it is joined to. `.` and
/// empty segments are neutral.
fn stays_below_root(path: &str) -> bool {
    let mut depth = 0i32;
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => depth += 1,
        }
    }
    true
}

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Try to serve the request's path from the tree. Returns false
    /// when nothing was served, leaving the response untouched.
    pub fn try_serve(&self, request: &mut RequestMessage, response: &mut ResponseMessage) -> bool {
        let uri = request.uri();
        let path_part = uri.split('?').next().unwrap_or(uri);
        let decoded = url_decode(path_part);
        if !stays_below_root(&decoded) {
            warn!(uri, "rejected path climbing above the file root");
            return false;
        }

        let relative = decoded.trim_start_matches('/');
        let full = if relative.is_empty() {
            self.root.join("index.html")
        } else {
            self.root.join(relative)
        };

        let Ok(mut file) = File::open(&full) else {
            return false;
        };
        let Ok(meta) = file.metadata() else {
            return false;
        };
        if !meta.is_file() {
            return false;
        }

        let size = meta.len();
        debug!(path = %full.display(), size, "serving static file");
        if size <= MAX_INLINE_FILE {
            let mut content = Vec::with_capacity(size as usize);
            if file.read_to_end(&mut content).is_err() {
                return false;
            }
            response.set_status(StatusCode::OK);
            response.add_field("Content-Type", mime_type(&full));
            response.add_field("Connection", "close");
            response.append_body(&content);
        } else {
            response.set_status(StatusCode::OK);
            response.add_field("Content-Type", mime_type(&full));
            response.add_field("Connection", "close");
            // a read error ends the stream early, the close tells the
            // peer nothing more is coming
            response.stream_body(move |out: &mut [u8]| file.read(out).unwrap_or(0));
        }
        true
    }
}
