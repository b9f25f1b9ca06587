//! Framing dispatch over the per-mode decoders.

use tracing::trace;

use crate::codec::accumulator::Accumulator;
use crate::codec::body::{ChunkedDecoder, LengthDecoder, UntilCloseDecoder};
use crate::protocol::body::{BodyKind, BodySink};
use crate::protocol::error::ParseError;

/// Outcome of one decode pass over the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameResult {
    /// the body needs more input before it can complete
    NeedMore,
    /// the body is complete and the terminator has been delivered
    Done,
}

/// Body decoder for one request, built from its framing kind.
///
/// For `Length` and `Chunked` framing the decoder itself delivers the
/// end-of-body `None` to the sink before reporting [`FrameResult::Done`].
/// `UntilClose` framing never completes from input alone; the connection
/// delivers the terminator when it sees end-of-stream.
#[derive(Debug)]
pub struct BodyDecoder {
    mode: Mode,
}

#[derive(Debug)]
enum Mode {
    None,
    UntilClose(UntilCloseDecoder),
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
}

impl BodyDecoder {
    pub fn new(kind: BodyKind) -> Self {
        let mode = match kind {
            BodyKind::None => Mode::None,
            BodyKind::UntilClose => Mode::UntilClose(UntilCloseDecoder),
            BodyKind::Length(length) => Mode::Length(LengthDecoder::new(length)),
            BodyKind::Chunked => Mode::Chunked(ChunkedDecoder::new()),
        };
        Self { mode }
    }

    pub fn is_until_close(&self) -> bool {
        matches!(self.mode, Mode::UntilClose(_))
    }

    /// Consume whatever the accumulator holds for this body.
    pub fn decode(
        &mut self,
        acc: &mut Accumulator,
        sink: Option<&mut (dyn BodySink + Send)>,
    ) -> Result<FrameResult, ParseError> {
        match &mut self.mode {
            Mode::None => Ok(FrameResult::Done),
            Mode::UntilClose(decoder) => decoder.decode(acc, sink),
            Mode::Length(decoder) => decoder.decode(acc, sink),
            Mode::Chunked(decoder) => decoder.decode(acc, sink),
        }
    }
}

/// Hand a span to the sink, or drop it when no sink is installed.
pub(crate) fn deliver(sink: &mut Option<&mut (dyn BodySink + Send)>, data: Option<&[u8]>) {
    match sink {
        Some(sink) => sink.receive(data),
        None => {
            if let Some(bytes) = data {
                trace!(len = bytes.len(), "no body sink installed, bytes dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_body_completes_without_touching_the_sink() {
        let mut acc = Accumulator::with_capacity(64);
        acc.append(b"leftover");
        let mut decoder = BodyDecoder::new(BodyKind::None);
        let mut calls = 0usize;
        let mut sink = |_data: Option<&[u8]>| calls += 1;
        let result = decoder.decode(&mut acc, Some(&mut sink)).unwrap();

        assert_eq!(result, FrameResult::Done);
        assert_eq!(calls, 0);
        // surplus input is not the body decoder's to consume
        assert_eq!(acc.window(), b"leftover");
    }

    #[test]
    fn missing_sink_discards_but_keeps_framing() {
        let mut acc = Accumulator::with_capacity(64);
        acc.append(b"0123456789");
        let mut decoder = BodyDecoder::new(BodyKind::Length(10));
        let result = decoder.decode(&mut acc, None).unwrap();

        assert_eq!(result, FrameResult::Done);
        assert!(acc.is_empty());
    }
}
