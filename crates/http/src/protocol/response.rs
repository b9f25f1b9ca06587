//! Response-side message type and the producer seam.
//!
//! A [`ResponseMessage`] is populated by the request callback and written
//! out after the request body completes. The head is typed (status plus
//! field pairs) and the body is a byte buffer; an application that wants
//! full control can skip [`set_status`] and push a complete raw response
//! through [`append_body`] instead. Responses are close-framed: the
//! connection is shut down once the buffer and any producer are drained,
//! and no framing headers are added on the application's behalf.
//!
//! [`set_status`]: ResponseMessage::set_status
//! [`append_body`]: ResponseMessage::append_body

use std::fmt;

use bytes::BytesMut;
use http::StatusCode;

use crate::protocol::request::HeaderField;

/// Refill size for producer-backed bodies.
const PRODUCER_WINDOW_SIZE: usize = 4 * 1024;

/// Pull-mode source for response bodies too large to buffer.
///
/// [`produce`] fills as much of `out` as it likes and returns the number
/// of bytes written; returning `0` ends the stream. It is called again
/// only after the previous window was fully written to the peer.
///
/// [`produce`]: BodyProducer::produce
pub trait BodyProducer {
    fn produce(&mut self, out: &mut [u8]) -> usize;
}

impl<F> BodyProducer for F
where
    F: FnMut(&mut [u8]) -> usize,
{
    fn produce(&mut self, out: &mut [u8]) -> usize {
        self(out)
    }
}

/// One outgoing response: typed head, buffered body, optional producer.
#[derive(Default)]
pub struct ResponseMessage {
    status: Option<StatusCode>,
    fields: Vec<HeaderField>,
    body: BytesMut,
    producer: Option<Box<dyn BodyProducer + Send>>,
    /// serialized head + body once frozen
    wire: BytesMut,
    windex: usize,
    frozen: bool,
}

impl ResponseMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status line. The last call wins.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn add_field<N, V>(&mut self, name: N, value: V)
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.fields.push(HeaderField::new(name, value));
    }

    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    /// Append bytes to the buffered body.
    pub fn append_body(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    /// The buffered body as appended so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Install a producer that continues the body after the buffered
    /// bytes. It starts getting polled once the buffer has drained.
    pub fn stream_body<P>(&mut self, producer: P)
    where
        P: BodyProducer + Send + 'static,
    {
        self.producer = Some(Box::new(producer));
    }

    /// True when the callback left nothing to send, which closes the
    /// connection without a write phase.
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.fields.is_empty()
            && self.body.is_empty()
            && self.producer.is_none()
    }

    /// Serialize the head in front of the buffered body. Idempotent;
    /// called when the connection enters its write phase.
    pub(crate) fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        self.frozen = true;
        if let Some(status) = self.status {
            self.wire.extend_from_slice(b"HTTP/1.1 ");
            self.wire.extend_from_slice(status.as_str().as_bytes());
            self.wire.extend_from_slice(b" ");
            let reason = status.canonical_reason().unwrap_or("Unknown");
            self.wire.extend_from_slice(reason.as_bytes());
            self.wire.extend_from_slice(b"\r\n");
            for field in &self.fields {
                self.wire.extend_from_slice(field.name.as_bytes());
                self.wire.extend_from_slice(b": ");
                self.wire.extend_from_slice(field.value.as_bytes());
                self.wire.extend_from_slice(b"\r\n");
            }
            self.wire.extend_from_slice(b"\r\n");
        }
        // without a status line the body is taken as a raw pre-built
        // response and passed through untouched
        self.wire.extend_from_slice(&self.body);
        self.body.clear();
    }

    /// Next unwritten span, refilled from the producer when the buffer
    /// runs dry. `None` means the response is fully drained.
    ///
    /// Only meaningful once the connection has entered its write phase.
    pub fn next_window(&mut self) -> Option<&[u8]> {
        if self.windex < self.wire.len() {
            return Some(&self.wire[self.windex..]);
        }
        let producer = self.producer.as_mut()?;
        self.wire.resize(PRODUCER_WINDOW_SIZE, 0);
        let n = producer.produce(&mut self.wire);
        self.wire.truncate(n);
        self.windex = 0;
        if n == 0 {
            self.producer = None;
            return None;
        }
        Some(&self.wire)
    }

    /// Record that the peer accepted `n` more bytes of the current window.
    pub fn advance_written(&mut self, n: usize) {
        self.windex += n;
    }

    pub fn write_complete(&self) -> bool {
        self.frozen && self.windex >= self.wire.len() && self.producer.is_none()
    }

    /// Drop all content so the slot can serve another connection.
    pub(crate) fn reset(&mut self) {
        self.status = None;
        self.fields.clear();
        self.body.clear();
        self.producer = None;
        self.wire.clear();
        self.windex = 0;
        self.frozen = false;
    }
}

impl fmt::Debug for ResponseMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseMessage")
            .field("status", &self.status)
            .field("fields", &self.fields)
            .field("body_len", &self.body.len())
            .field("producer", &self.producer.is_some())
            .field("windex", &self.windex)
            .field("frozen", &self.frozen)
            .finish()
    }
}
