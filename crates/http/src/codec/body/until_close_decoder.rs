//! Until-close body framing, the fallback when a request declares no
//! length and no chunking. Every byte that arrives is body; completion
//! comes from the connection observing end-of-stream, never from here.

use crate::codec::accumulator::Accumulator;
use crate::codec::body::decoder::{deliver, FrameResult};
use crate::protocol::body::BodySink;
use crate::protocol::error::ParseError;

#[derive(Debug)]
pub struct UntilCloseDecoder;

impl UntilCloseDecoder {
    pub fn decode(
        &mut self,
        acc: &mut Accumulator,
        mut sink: Option<&mut (dyn BodySink + Send)>,
    ) -> Result<FrameResult, ParseError> {
        if !acc.is_empty() {
            let window = acc.window();
            deliver(&mut sink, Some(window));
            let n = window.len();
            acc.consume(n);
        }
        Ok(FrameResult::NeedMore)
    }
}
