//! Per-connection protocol state machine, free of I/O.
//!
//! A [`Connection`] is driven from outside: the owner copies received
//! bytes in with [`feed`] or reads straight into [`space`] and commits
//! with [`fill`], then calls [`advance`] and acts on the returned
//! [`Flow`]. End-of-stream is reported through [`on_eof`]. Keeping the
//! socket out of this type is what makes every state transition
//! testable byte by byte.
//!
//! The lifecycle per connection is single-shot: header, body, response,
//! close. The handler runs once, between the header and the body.
//!
//! [`feed`]: Connection::feed
//! [`space`]: Connection::space
//! [`fill`]: Connection::fill
//! [`advance`]: Connection::advance
//! [`on_eof`]: Connection::on_eof

use tracing::{debug, trace};

use crate::codec::accumulator::Accumulator;
use crate::codec::body::{BodyDecoder, FrameResult};
use crate::codec::header_decoder::HeaderDecoder;
use crate::handler::Handler;
use crate::protocol::error::{HttpError, ParseError};
use crate::protocol::request::RequestMessage;
use crate::protocol::response::ResponseMessage;

/// What the connection needs its driver to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// feed more input
    ReadMore,
    /// drain the response windows
    Write,
    /// shut the connection down
    Close,
}

#[derive(Debug)]
enum State {
    Header,
    Body { decoder: BodyDecoder },
    Write,
    Closed,
}

#[derive(Debug)]
pub struct Connection {
    acc: Accumulator,
    header_decoder: HeaderDecoder,
    state: State,
    request: Option<RequestMessage>,
    response: ResponseMessage,
}

impl Connection {
    /// `recv_capacity` sizes the receive accumulator, `max_header_size`
    /// caps the request head.
    pub fn new(recv_capacity: usize, max_header_size: usize) -> Self {
        Self {
            acc: Accumulator::with_capacity(recv_capacity),
            header_decoder: HeaderDecoder::with_max_size(max_header_size),
            state: State::Header,
            request: None,
            response: ResponseMessage::new(),
        }
    }

    /// Copy received bytes in; returns how many fit.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        self.acc.append(bytes)
    }

    /// Writable tail of the receive buffer for direct socket reads.
    pub fn space(&mut self) -> &mut [u8] {
        self.acc.space()
    }

    /// Commit `n` bytes read into [`space`](Connection::space).
    pub fn fill(&mut self, n: usize) {
        self.acc.fill(n);
    }

    pub fn response_mut(&mut self) -> &mut ResponseMessage {
        &mut self.response
    }

    /// Run the state machine over everything currently buffered.
    pub fn advance<H: Handler>(&mut self, handler: &H) -> Result<Flow, HttpError> {
        loop {
            match &mut self.state {
                State::Header => {
                    let Some(mut request) = self.header_decoder.decode(&mut self.acc)? else {
                        return Ok(Flow::ReadMore);
                    };
                    debug!(
                        method = %request.method(),
                        uri = request.uri(),
                        body = ?request.body_kind(),
                        "request received"
                    );
                    handler.handle(&mut request, &mut self.response);
                    let decoder = BodyDecoder::new(request.body_kind());
                    self.request = Some(request);
                    self.state = State::Body { decoder };
                }
                State::Body { decoder } => {
                    let sink = self.request.as_mut().and_then(RequestMessage::sink_mut);
                    match decoder.decode(&mut self.acc, sink)? {
                        FrameResult::NeedMore => return Ok(Flow::ReadMore),
                        FrameResult::Done => self.finish_body(),
                    }
                }
                State::Write => return Ok(Flow::Write),
                State::Closed => return Ok(Flow::Close),
            }
        }
    }

    /// The peer closed its write side.
    ///
    /// Mid-header or mid-body this is fatal, except for until-close
    /// framing where end-of-stream is exactly how the body completes:
    /// the sink gets its terminator and the response phase begins.
    pub fn on_eof(&mut self) -> Result<Flow, HttpError> {
        match &mut self.state {
            State::Header => Err(ParseError::UnexpectedEof.into()),
            State::Body { decoder } => {
                if !decoder.is_until_close() {
                    return Err(ParseError::UnexpectedEof.into());
                }
                trace!("end of until-close body");
                if let Some(sink) = self.request.as_mut().and_then(RequestMessage::sink_mut) {
                    sink.receive(None);
                }
                self.finish_body();
                self.advance_after_body()
            }
            State::Write => Ok(Flow::Write),
            State::Closed => Ok(Flow::Close),
        }
    }

    fn finish_body(&mut self) {
        self.request = None;
        if self.response.is_empty() {
            debug!("empty response, closing without a write phase");
            self.state = State::Closed;
        } else {
            self.response.freeze();
            self.state = State::Write;
        }
    }

    fn advance_after_body(&mut self) -> Result<Flow, HttpError> {
        match self.state {
            State::Write => Ok(Flow::Write),
            _ => Ok(Flow::Close),
        }
    }

    /// Put the connection back in its initial state, keeping buffers.
    pub fn reset(&mut self) {
        self.acc.reset();
        self.header_decoder.reset();
        self.state = State::Header;
        self.request = None;
        self.response.reset();
    }
}
