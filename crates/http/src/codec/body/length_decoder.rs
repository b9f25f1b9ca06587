//! `Content-Length` body framing.

use tracing::trace;

use crate::codec::accumulator::Accumulator;
use crate::codec::body::decoder::{deliver, FrameResult};
use crate::protocol::body::BodySink;
use crate::protocol::error::ParseError;

/// Counts the declared byte total down to zero.
#[derive(Debug)]
pub struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    /// Deliver up to `remaining` bytes from the window. Bytes beyond the
    /// declared length are left untouched.
    pub fn decode(
        &mut self,
        acc: &mut Accumulator,
        mut sink: Option<&mut (dyn BodySink + Send)>,
    ) -> Result<FrameResult, ParseError> {
        while self.remaining > 0 && !acc.is_empty() {
            let window = acc.window();
            let n = usize::try_from(self.remaining).unwrap_or(usize::MAX).min(window.len());
            trace!(n, remaining = self.remaining, "length-framed span");
            deliver(&mut sink, Some(&window[..n]));
            acc.consume(n);
            self.remaining -= n as u64;
        }
        if self.remaining == 0 {
            deliver(&mut sink, None);
            Ok(FrameResult::Done)
        } else {
            Ok(FrameResult::NeedMore)
        }
    }
}
