//! A demonstration API endpoint.
//!
//! Every request gets back an HTML breakdown of what the server
//! understood: the decomposed URL and, when a body was sent, the
//! uploads pulled out of it by [`MultipartStream`]. The body sink and
//! the response producer share one report behind a mutex; the producer
//! renders lazily, and since the response only starts draining once
//! the body has finished, the report is complete by then.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use http::StatusCode;
use pocket_http::handler::Handler;
use pocket_http::multipart::{BlockEvent, MultipartStream};
use pocket_http::protocol::{RequestMessage, ResponseMessage};
use tracing::debug;

use crate::url::UrlComponents;

/// One upload pulled out of the request body. Raw (non-multipart)
/// bodies count as a single upload named `body`.
#[derive(Debug)]
struct Upload {
    name: String,
    filename: String,
    received: usize,
}

#[derive(Debug)]
struct Report {
    components: UrlComponents,
    uploads: Vec<Upload>,
}

/// Pull one attribute value out of a Content-Disposition field value;
/// `attribute(v, "filename")` on `form-data; filename="a.txt"` gives
/// `Some("a.txt")`.
fn attribute<'a>(disposition: &'a str, key: &str) -> Option<&'a str> {
    disposition.split(';').find_map(|attr| {
        let (name, value) = attr.trim().split_once('=')?;
        (name == key).then(|| value.trim_matches('"'))
    })
}

fn record(report: &mut Report, event: BlockEvent<'_>) {
    match event {
        BlockEvent::Start { .. } | BlockEvent::DataEnd | BlockEvent::Terminate => {}
        BlockEvent::DataStart => {
            report.uploads.push(Upload {
                name: "body".to_string(),
                filename: String::new(),
                received: 0,
            });
        }
        BlockEvent::SubHeader { fields } => {
            let disposition = fields
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case("Content-Disposition"))
                .map(|f| f.value.as_str())
                .unwrap_or("");
            report.uploads.push(Upload {
                name: attribute(disposition, "name").unwrap_or("").to_string(),
                filename: attribute(disposition, "filename").unwrap_or("").to_string(),
                received: 0,
            });
        }
        BlockEvent::DataBlock { bytes } => {
            if let Some(upload) = report.uploads.last_mut() {
                upload.received += bytes.len();
            }
        }
    }
}

fn render(report: &Report) -> Vec<u8> {
    let c = &report.components;
    let mut page = String::new();
    page.push_str("<html><body><h1>Request report</h1>\n<ul>\n");
    let _ = writeln!(page, "<li>api version: {}</li>", c.apiversion);
    let _ = writeln!(page, "<li>route: {}</li>", c.route);
    let _ = writeln!(page, "<li>path: {}</li>", c.path);
    let _ = writeln!(page, "<li>command: {}</li>", c.command);
    for parameter in &c.parameters {
        let _ = writeln!(page, "<li>parameter {}: {}</li>", parameter.name, parameter.value);
    }
    page.push_str("</ul>\n<h2>Uploads</h2>\n<ul>\n");
    for upload in &report.uploads {
        let _ = write!(page, "<li>{}", upload.name);
        if !upload.filename.is_empty() {
            let _ = write!(page, " ({})", upload.filename);
        }
        let _ = writeln!(page, ": {} bytes</li>", upload.received);
    }
    page.push_str("</ul>\n</body></html>\n");
    page.into_bytes()
}

/// Answers every recognized API url with a request report; anything
/// that does not follow the `/version/route/path:command` scheme gets
/// a 400.
#[derive(Debug, Default)]
pub struct ApiHandler;

impl ApiHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for ApiHandler {
    fn handle(&self, request: &mut RequestMessage, response: &mut ResponseMessage) {
        let Some(components) = UrlComponents::parse(request.uri()) else {
            debug!(uri = request.uri(), "api url did not parse");
            response.set_status(StatusCode::BAD_REQUEST);
            response.add_field("Content-Type", "text/plain");
            response.add_field("Connection", "close");
            response.append_body(b"unrecognized api url\n");
            return;
        };
        debug!(route = %components.route, command = %components.command, "api request");

        let report = Arc::new(Mutex::new(Report { components, uploads: Vec::new() }));

        if request.has_body() {
            let content_type = request.content_type().unwrap_or("").to_string();
            let recorder = Arc::clone(&report);
            let stream = MultipartStream::new(&content_type, move |event: BlockEvent<'_>| {
                record(&mut recorder.lock().unwrap_or_else(PoisonError::into_inner), event);
            });
            request.set_body_sink(stream);
        }

        response.set_status(StatusCode::OK);
        response.add_field("Content-Type", "text/html");
        response.add_field("Connection", "close");
        let mut page: Option<Vec<u8>> = None;
        let mut written = 0usize;
        response.stream_body(move |out: &mut [u8]| {
            let page = page.get_or_insert_with(|| {
                render(&report.lock().unwrap_or_else(PoisonError::into_inner))
            });
            let n = out.len().min(page.len() - written);
            out[..n].copy_from_slice(&page[written..written + n]);
            written += n;
            n
        });
    }
}
