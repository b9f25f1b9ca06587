//! Method plus URI dispatch table.
//!
//! Routes are matched in registration order. A route matches when its
//! URI equals the request URI up to an optional querystring, so
//! `/v1/files` serves `/v1/files` and `/v1/files?recent=1` but not
//! `/v1/filesystem` or `/v1/files/2024`. Unmatched GETs fall through
//! to the static file tree when one is mounted; everything else gets
//! the built-in 404.

use http::StatusCode;
use pocket_http::handler::Handler;
use pocket_http::protocol::{Method, RequestMessage, ResponseMessage};
use tracing::{debug, trace};

use crate::sfile::StaticFiles;

struct Route {
    method: Method,
    uri: String,
    handler: Box<dyn Handler>,
}

/// The dispatch table. Implements [`Handler`], so it plugs straight
/// into a [`Server`](pocket_http::server::Server).
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    static_files: Option<StaticFiles>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Registration order is match order.
    #[must_use]
    pub fn route<U, T>(mut self, method: Method, uri: U, handler: T) -> Self
    where
        U: Into<String>,
        T: Handler + 'static,
    {
        self.routes.push(Route { method, uri: uri.into(), handler: Box::new(handler) });
        self
    }

    /// Mount a static file tree as the GET fallback.
    #[must_use]
    pub fn static_files(mut self, files: StaticFiles) -> Self {
        self.static_files = Some(files);
        self
    }

    fn matches(route_uri: &str, request_uri: &str) -> bool {
        request_uri
            .strip_prefix(route_uri)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('?'))
    }
}

impl Handler for Router {
    fn handle(&self, request: &mut RequestMessage, response: &mut ResponseMessage) {
        for route in &self.routes {
            if route.method == request.method() && Self::matches(&route.uri, request.uri()) {
                trace!(uri = %route.uri, "route matched");
                return route.handler.handle(request, response);
            }
        }
        if request.method() == Method::Get {
            if let Some(files) = &self.static_files {
                if files.try_serve(request, response) {
                    return;
                }
            }
        }
        debug!(method = %request.method(), uri = request.uri(), "no route matched");
        not_found(response);
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let uris: Vec<&str> = self.routes.iter().map(|r| r.uri.as_str()).collect();
        f.debug_struct("Router")
            .field("routes", &uris)
            .field("static_files", &self.static_files)
            .finish()
    }
}

/// The stock 404 page.
pub fn not_found(response: &mut ResponseMessage) {
    response.set_status(StatusCode::NOT_FOUND);
    response.add_field("Content-Type", "text/html");
    response.add_field("Connection", "close");
    response.append_body(
        b"<html><head><title>Not Found</title></head>\
          <body><h1>404 Not Found</h1></body></html>",
    );
}
