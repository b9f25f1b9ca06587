//! The application seam: one callback per request.
//!
//! The handler runs synchronously as soon as the request head has been
//! parsed and before any body bytes are decoded. That ordering is what
//! lets it install a [`BodySink`](crate::protocol::body::BodySink) and a
//! response producer for content derived from the body; the response
//! itself is only written once the body has completed.

use crate::protocol::request::RequestMessage;
use crate::protocol::response::ResponseMessage;

pub trait Handler: Send + Sync {
    fn handle(&self, request: &mut RequestMessage, response: &mut ResponseMessage);
}

/// [`Handler`] backed by a plain function or closure.
pub struct HandlerFn<F> {
    f: F,
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut RequestMessage, &mut ResponseMessage) + Send + Sync,
{
    fn handle(&self, request: &mut RequestMessage, response: &mut ResponseMessage) {
        (self.f)(request, response);
    }
}

impl<F> std::fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HandlerFn")
    }
}

pub fn make_handler<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut RequestMessage, &mut ResponseMessage) + Send + Sync,
{
    HandlerFn { f }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    #[test]
    fn closure_handlers_see_request_and_response() {
        let handler = make_handler(|request, response| {
            assert_eq!(request.uri(), "");
            response.set_status(StatusCode::OK);
        });
        let mut request = RequestMessage::default();
        let mut response = ResponseMessage::new();
        handler.handle(&mut request, &mut response);
        assert_eq!(response.status(), Some(StatusCode::OK));
    }
}
