//! `Transfer-Encoding: chunked` body framing.
//!
//! Size lines are read with the accumulator's line extractor, so a size
//! line may arrive in any number of fragments. Parsing takes the leading
//! hex digits and ignores the rest of the line, which covers chunk
//! extensions; a line with no digits at all counts as size zero and
//! therefore ends the body. Chunk payload is delivered as it arrives,
//! never waiting for a chunk to buffer completely.

use tracing::trace;

use crate::codec::accumulator::Accumulator;
use crate::codec::body::decoder::{deliver, FrameResult};
use crate::protocol::body::BodySink;
use crate::protocol::error::ParseError;
use crate::utils::ensure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// expecting a chunk size line
    SizeLine,
    /// inside a chunk's payload
    Body { remaining: u64 },
    /// expecting the line that closes the previous chunk
    TrailerLine,
    /// the zero-size chunk has been seen
    Finished,
}

#[derive(Debug)]
pub struct ChunkedDecoder {
    state: ChunkedState,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: ChunkedState::SizeLine }
    }

    /// Work through as many frames as the window allows.
    ///
    /// The line after the terminal zero-size chunk is left unconsumed;
    /// the connection closes without ever looking at it.
    pub fn decode(
        &mut self,
        acc: &mut Accumulator,
        mut sink: Option<&mut (dyn BodySink + Send)>,
    ) -> Result<FrameResult, ParseError> {
        loop {
            match self.state {
                ChunkedState::SizeLine => {
                    let Some(line) = acc.next_line() else {
                        ensure!(
                            acc.len() < acc.capacity(),
                            ParseError::invalid_chunk_size("size line exceeds buffer capacity")
                        );
                        return Ok(FrameResult::NeedMore);
                    };
                    let size = parse_chunk_size(line)?;
                    trace!(size, "chunk size line");
                    if size == 0 {
                        deliver(&mut sink, None);
                        self.state = ChunkedState::Finished;
                        return Ok(FrameResult::Done);
                    }
                    self.state = ChunkedState::Body { remaining: size };
                }
                ChunkedState::Body { remaining } => {
                    if acc.is_empty() {
                        return Ok(FrameResult::NeedMore);
                    }
                    let window = acc.window();
                    let n = usize::try_from(remaining).unwrap_or(usize::MAX).min(window.len());
                    deliver(&mut sink, Some(&window[..n]));
                    acc.consume(n);
                    let left = remaining - n as u64;
                    self.state = if left == 0 {
                        ChunkedState::TrailerLine
                    } else {
                        ChunkedState::Body { remaining: left }
                    };
                }
                ChunkedState::TrailerLine => {
                    let Some(_line) = acc.next_line() else {
                        ensure!(
                            acc.len() < acc.capacity(),
                            ParseError::invalid_chunk_size("trailer line exceeds buffer capacity")
                        );
                        return Ok(FrameResult::NeedMore);
                    };
                    self.state = ChunkedState::SizeLine;
                }
                ChunkedState::Finished => return Ok(FrameResult::Done),
            }
        }
    }
}

/// Leading hex digits of a size line; everything after them is ignored.
fn parse_chunk_size(line: &[u8]) -> Result<u64, ParseError> {
    let mut size: u64 = 0;
    for &byte in line {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ => break,
        };
        size = size
            .checked_mul(16)
            .and_then(|s| s.checked_add(u64::from(digit)))
            .ok_or_else(|| ParseError::invalid_chunk_size("size overflows u64"))?;
    }
    Ok(size)
}
