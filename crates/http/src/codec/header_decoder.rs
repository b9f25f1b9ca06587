//! Incremental request-head decoder.
//!
//! The decoder accumulates bytes into its own capped region until the
//! `\r\n\r\n` terminator shows up, then parses the whole block in one
//! go. Parsing is deliberately lenient: the verb is matched by prefix,
//! field lines split on the first `:` with only leading value spaces
//! stripped, and a malformed line ends field collection instead of
//! failing the request. Anything past the terminator stays in the
//! accumulator for the body phase.

use tracing::{trace, warn};

use crate::codec::accumulator::Accumulator;
use crate::protocol::body::BodyKind;
use crate::protocol::error::ParseError;
use crate::protocol::request::{Method, RequestMessage};
use crate::utils::ensure;

/// Default cap on the size of one request head.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 4 * 1024;

#[derive(Debug)]
pub struct HeaderDecoder {
    /// bytes moved out of the accumulator so far, capped at `max_size`
    region: Vec<u8>,
    max_size: usize,
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderDecoder {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_HEADER_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self { region: Vec::new(), max_size }
    }

    /// Feed the accumulator's window through the decoder.
    ///
    /// Returns `Ok(None)` while the head is still incomplete. On
    /// completion the head bytes have been consumed from the
    /// accumulator and any surplus is left for the body decoders.
    pub fn decode(&mut self, acc: &mut Accumulator) -> Result<Option<RequestMessage>, ParseError> {
        let old_len = self.region.len();
        let room = self.max_size - old_len;
        let window = acc.window();
        let take = window.len().min(room);
        self.region.extend_from_slice(&window[..take]);

        // the terminator may straddle the previous chunk, back up three
        // bytes before scanning the freshly appended ones
        let search_from = old_len.saturating_sub(3);
        let Some(end) = find_block_end(&self.region, search_from) else {
            acc.consume(take);
            ensure!(
                self.region.len() < self.max_size,
                ParseError::too_large_header(self.region.len(), self.max_size)
            );
            return Ok(None);
        };

        acc.consume(end - old_len);
        let request = parse_header_block(&self.region[..end - 4])?;
        trace!(method = %request.method(), uri = request.uri(), "request head decoded");
        self.region.clear();
        Ok(Some(request))
    }

    pub fn reset(&mut self) {
        self.region.clear();
    }
}

/// Index just past the `\r\n\r\n` terminator, scanning from `from`.
fn find_block_end(region: &[u8], from: usize) -> Option<usize> {
    region
        .windows(4)
        .skip(from)
        .position(|quad| quad == b"\r\n\r\n")
        .map(|pos| from + pos + 4)
}

fn parse_header_block(block: &[u8]) -> Result<RequestMessage, ParseError> {
    let text = String::from_utf8_lossy(block);
    let mut request = RequestMessage::default();
    let mut lines = text.split("\r\n");

    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.splitn(3, ' ');
    let verb = parts.next().unwrap_or("");
    let uri = parts.next().unwrap_or("");
    let version = parts.next().unwrap_or("");
    request.set_request_line(Method::from_token(verb), uri, version);

    for line in lines {
        // a line without a colon, the empty line included, ends field
        // collection and the rest of the block is ignored
        let Some((name, value)) = line.split_once(':') else {
            break;
        };
        request.push_field(name, value.trim_start_matches(' '));
    }

    let kind = body_kind_from_fields(&request)?;
    request.set_body_kind(kind);
    Ok(request)
}

/// Derive body framing from the parsed fields.
///
/// The first `Content-Length` wins; a `Transfer-Encoding` mentioning
/// `chunked` overrides it. A request with neither defaults to reading
/// until the peer closes, whatever the method.
fn body_kind_from_fields(request: &RequestMessage) -> Result<BodyKind, ParseError> {
    let mut kind = BodyKind::None;
    if let Some(value) = request.field("content-length") {
        let length = value
            .trim()
            .parse::<u64>()
            .map_err(|e| ParseError::invalid_content_length(format!("{value:?}: {e}")))?;
        kind = BodyKind::Length(length);
    }
    if let Some(value) = request.field("transfer-encoding") {
        if value.contains("chunked") {
            kind = BodyKind::Chunked;
        } else {
            warn!(value, "unsupported transfer encoding, ignoring");
        }
    }
    if kind.is_none() {
        kind = BodyKind::UntilClose;
    }
    Ok(kind)
}
