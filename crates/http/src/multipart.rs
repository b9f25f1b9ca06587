//! Streaming `multipart/form-data` decoder.
//!
//! [`MultipartStream`] is a body sink that re-frames raw body bytes into
//! part events. It runs a byte automaton around one token, `\r\n--`
//! followed by the boundary value, with no lookahead and no rescanning:
//! match progress carries across arbitrarily fragmented input, and a
//! false start is replayed into the surrounding part data the moment it
//! mismatches. Arrival order is delivery order.
//!
//! The boundary value is taken verbatim from the first `boundary=` in
//! the content type to the end of the string. Quoting or trailing
//! parameters are not unpicked; a sender whose wire boundary differs
//! from that literal tail simply never matches, and the whole body is
//! discarded as preamble. The first boundary on the wire lacks the
//! leading `\r\n`, which the automaton accounts for by starting with two
//! bytes of the token already matched.
//!
//! A content type that is not `multipart` at all, or carries no
//! `boundary=`, degrades to a passthrough: the body is forwarded as
//! anonymous data blocks between [`DataStart`] and [`DataEnd`].
//!
//! [`DataStart`]: BlockEvent::DataStart
//! [`DataEnd`]: BlockEvent::DataEnd

use std::fmt;

use tracing::trace;

use crate::protocol::body::BodySink;
use crate::protocol::request::HeaderField;

/// Cap on one part's header block. Bytes past the cap are dropped while
/// the terminator search keeps running.
const HEADER_BUFFER_SIZE: usize = 1024;

/// Part data is coalesced up to this size before being flushed.
const DATA_BUFFER_SIZE: usize = 4 * 1024;

/// Part header lines considered before the rest of the block is ignored.
const MAX_PART_FIELDS: usize = 8;

/// The `\r\n\r\n` that closes a part's header block.
const HEADER_END: &[u8; 4] = b"\r\n\r\n";

/// One event in the life of a decoded body.
///
/// Multipart bodies produce `Start`, then per part `SubHeader` followed
/// by `DataBlock`s and one `DataEnd`, and finally `Terminate`.
/// Passthrough bodies produce `Start`, `DataStart`, raw `DataBlock`s,
/// `DataEnd`, `Terminate`. All borrowed data dies with the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockEvent<'a> {
    /// body decoding begins; carries the request's content type
    Start { content_type: &'a str },
    /// passthrough payload follows
    DataStart,
    /// a part's header block, parsed into field pairs
    SubHeader { fields: &'a [HeaderField] },
    /// a run of payload bytes
    DataBlock { bytes: &'a [u8] },
    /// the current payload run is complete
    DataEnd,
    /// the body is complete; no further events follow
    Terminate,
}

/// Receiver for [`BlockEvent`]s.
pub trait BlockHandler {
    fn on_block(&mut self, event: BlockEvent<'_>);
}

impl<F> BlockHandler for F
where
    F: FnMut(BlockEvent<'_>),
{
    fn on_block(&mut self, event: BlockEvent<'_>) {
        self(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    /// before the first boundary, bytes are preamble and are dropped
    Ditch,
    /// collecting a part's header block
    Header,
    /// inside a part's payload
    Data,
    /// non-multipart passthrough
    Binary,
    /// terminated, all further input is ignored
    Terminated,
}

/// The streaming decoder. Feed it with its [`BodySink`] impl.
pub struct MultipartStream<H> {
    handler: H,
    state: StreamState,
    /// `\r\n--` + boundary value; empty in passthrough mode
    boundary: Vec<u8>,
    /// bytes of `boundary` matched so far
    matched: usize,
    header: Vec<u8>,
    /// bytes of [`HEADER_END`] matched so far
    header_matched: usize,
    data: Vec<u8>,
}

impl<H: BlockHandler> MultipartStream<H> {
    /// Build the decoder for one request body and emit `Start`.
    ///
    /// `content_type` decides the mode: a `multipart` prefix (compared
    /// case-insensitively) with a `boundary=` parameter arms the
    /// boundary automaton, anything else becomes a passthrough.
    pub fn new(content_type: &str, mut handler: H) -> Self {
        handler.on_block(BlockEvent::Start { content_type });

        let is_multipart = content_type.len() >= 9
            && content_type.as_bytes()[..9].eq_ignore_ascii_case(b"multipart");
        let boundary_value = content_type
            .find("boundary=")
            .map(|at| &content_type[at + "boundary=".len()..]);

        match boundary_value {
            Some(value) if is_multipart => {
                let mut boundary = b"\r\n--".to_vec();
                boundary.extend_from_slice(value.as_bytes());
                trace!(boundary = value, "multipart stream armed");
                Self {
                    handler,
                    state: StreamState::Ditch,
                    boundary,
                    // the first boundary on the wire has no leading crlf
                    matched: 2,
                    header: Vec::new(),
                    header_matched: 0,
                    data: Vec::new(),
                }
            }
            _ => {
                handler.on_block(BlockEvent::DataStart);
                Self {
                    handler,
                    state: StreamState::Binary,
                    boundary: Vec::new(),
                    matched: 0,
                    header: Vec::new(),
                    header_matched: 0,
                    data: Vec::new(),
                }
            }
        }
    }

    fn step(&mut self, byte: u8) {
        // a boundary completed by an earlier byte flips to header
        // collection before this byte is interpreted
        if self.matched == self.boundary.len() {
            self.enter_header();
        }

        if self.state == StreamState::Header {
            self.header_byte(byte);
            return;
        }

        if byte == self.boundary[self.matched] {
            self.matched += 1;
            return;
        }
        if self.matched > 0 {
            // false start: what looked like a boundary belongs to the
            // payload, replay it before reconsidering this byte
            let matched = self.matched;
            for at in 0..matched {
                let replayed = self.boundary[at];
                self.absorb(replayed);
            }
            self.matched = usize::from(byte == self.boundary[0]);
            if self.matched == 0 {
                self.absorb(byte);
            }
        } else {
            self.absorb(byte);
        }
    }

    /// Payload byte for the current state; preamble is dropped.
    fn absorb(&mut self, byte: u8) {
        if self.state == StreamState::Data {
            self.data.push(byte);
            if self.data.len() == DATA_BUFFER_SIZE {
                self.flush_data();
            }
        }
    }

    fn flush_data(&mut self) {
        if !self.data.is_empty() {
            self.handler.on_block(BlockEvent::DataBlock { bytes: &self.data });
            self.data.clear();
        }
    }

    fn enter_header(&mut self) {
        if self.state == StreamState::Data {
            self.flush_data();
            self.handler.on_block(BlockEvent::DataEnd);
        }
        self.state = StreamState::Header;
        self.matched = 0;
        self.header.clear();
        self.header_matched = 0;
    }

    fn header_byte(&mut self, byte: u8) {
        if self.header.len() < HEADER_BUFFER_SIZE {
            self.header.push(byte);
        }
        if byte == HEADER_END[self.header_matched] {
            self.header_matched += 1;
            if self.header_matched == HEADER_END.len() {
                let fields = parse_part_header(&self.header);
                self.handler.on_block(BlockEvent::SubHeader { fields: &fields });
                self.state = StreamState::Data;
                self.data.clear();
                self.matched = 0;
                self.header_matched = 0;
            }
        } else {
            self.header_matched = usize::from(byte == b'\r');
        }
    }

    /// End of input. A partially matched boundary is dropped, not
    /// replayed; it can no longer be payload or boundary.
    fn terminate(&mut self) {
        match self.state {
            StreamState::Terminated => return,
            StreamState::Data => {
                self.flush_data();
                self.handler.on_block(BlockEvent::DataEnd);
            }
            StreamState::Binary => self.handler.on_block(BlockEvent::DataEnd),
            StreamState::Ditch | StreamState::Header => {}
        }
        self.handler.on_block(BlockEvent::Terminate);
        self.state = StreamState::Terminated;
        self.boundary = Vec::new();
        self.header = Vec::new();
        self.data = Vec::new();
    }
}

impl<H: BlockHandler> BodySink for MultipartStream<H> {
    fn receive(&mut self, data: Option<&[u8]>) {
        match data {
            Some(chunk) if !chunk.is_empty() => match self.state {
                StreamState::Terminated => {
                    trace!(len = chunk.len(), "input after terminate ignored");
                }
                StreamState::Binary => {
                    self.handler.on_block(BlockEvent::DataBlock { bytes: chunk });
                }
                _ => {
                    for &byte in chunk {
                        self.step(byte);
                    }
                }
            },
            _ => self.terminate(),
        }
    }
}

impl<H> fmt::Debug for MultipartStream<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartStream")
            .field("state", &self.state)
            .field("matched", &self.matched)
            .field("header_len", &self.header.len())
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Parse a collected part header block into field pairs.
///
/// The block starts with the crlf that closed the boundary line, which
/// is skipped. Lines split on the first `:` with leading value spaces
/// stripped; an empty or malformed line ends the block.
fn parse_part_header(block: &[u8]) -> Vec<HeaderField> {
    let text = String::from_utf8_lossy(block.get(2..).unwrap_or(&[]));
    let mut fields = Vec::new();
    for line in text.split("\r\n").take(MAX_PART_FIELDS) {
        let Some((name, value)) = line.split_once(':') else {
            break;
        };
        fields.push(HeaderField::new(name, value.trim_start_matches(' ')));
    }
    fields
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Recorded {
        Start(String),
        DataStart,
        SubHeader(Vec<(String, String)>),
        Data(Vec<u8>),
        DataEnd,
        Terminate,
    }

    fn recorder(log: &Rc<RefCell<Vec<Recorded>>>) -> impl FnMut(BlockEvent<'_>) {
        let log = Rc::clone(log);
        move |event: BlockEvent<'_>| {
            let owned = match event {
                BlockEvent::Start { content_type } => Recorded::Start(content_type.to_owned()),
                BlockEvent::DataStart => Recorded::DataStart,
                BlockEvent::SubHeader { fields } => Recorded::SubHeader(
                    fields.iter().map(|f| (f.name.clone(), f.value.clone())).collect(),
                ),
                BlockEvent::DataBlock { bytes } => Recorded::Data(bytes.to_vec()),
                BlockEvent::DataEnd => Recorded::DataEnd,
                BlockEvent::Terminate => Recorded::Terminate,
            };
            log.borrow_mut().push(owned);
        }
    }

    fn run(content_type: &str, feeds: &[&[u8]]) -> Vec<Recorded> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stream = MultipartStream::new(content_type, recorder(&log));
        for feed in feeds {
            stream.receive(Some(feed));
        }
        stream.receive(None);
        drop(stream);
        Rc::try_unwrap(log).unwrap().into_inner()
    }

    /// Like [`run`] but delivering every byte as its own feed.
    fn run_fragmented(content_type: &str, body: &[u8]) -> Vec<Recorded> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stream = MultipartStream::new(content_type, recorder(&log));
        for byte in body {
            stream.receive(Some(std::slice::from_ref(byte)));
        }
        stream.receive(None);
        drop(stream);
        Rc::try_unwrap(log).unwrap().into_inner()
    }

    /// Collapse consecutive `Data` events so fragmentations compare equal.
    fn coalesced(events: Vec<Recorded>) -> Vec<Recorded> {
        let mut out: Vec<Recorded> = Vec::new();
        for event in events {
            if let (Recorded::Data(bytes), Some(Recorded::Data(tail))) =
                (&event, out.last_mut())
            {
                tail.extend_from_slice(bytes);
                continue;
            }
            out.push(event);
        }
        out
    }

    const ONE_PART_TYPE: &str = "multipart/form-data; boundary=XYZ";
    const ONE_PART_BODY: &[u8] =
        b"--XYZ\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\nABC\r\n--XYZ--\r\n";

    #[test]
    fn one_part_produces_the_full_event_sequence() {
        let events = run(ONE_PART_TYPE, &[ONE_PART_BODY]);
        assert_eq!(
            events,
            vec![
                Recorded::Start(ONE_PART_TYPE.to_owned()),
                Recorded::SubHeader(vec![(
                    "Content-Disposition".to_owned(),
                    "form-data; name=\"f\"".to_owned()
                )]),
                Recorded::Data(b"ABC".to_vec()),
                Recorded::DataEnd,
                Recorded::Terminate,
            ]
        );
    }

    #[test]
    fn byte_at_a_time_is_equivalent() {
        let whole = coalesced(run(ONE_PART_TYPE, &[ONE_PART_BODY]));
        let split = coalesced(run_fragmented(ONE_PART_TYPE, ONE_PART_BODY));
        assert_eq!(whole, split);
    }

    #[test]
    fn two_parts_each_get_subheader_and_data_end() {
        let body = b"--B\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nalpha\
                     \r\n--B\r\nContent-Disposition: form-data; name=\"b\"\r\n\r\nbeta!\
                     \r\n--B--\r\n";
        let events = coalesced(run("multipart/form-data; boundary=B", &[body]));
        assert_eq!(
            events,
            vec![
                Recorded::Start("multipart/form-data; boundary=B".to_owned()),
                Recorded::SubHeader(vec![(
                    "Content-Disposition".to_owned(),
                    "form-data; name=\"a\"".to_owned()
                )]),
                Recorded::Data(b"alpha".to_vec()),
                Recorded::DataEnd,
                Recorded::SubHeader(vec![(
                    "Content-Disposition".to_owned(),
                    "form-data; name=\"b\"".to_owned()
                )]),
                Recorded::Data(b"beta!".to_vec()),
                Recorded::DataEnd,
                Recorded::Terminate,
            ]
        );
    }

    #[test]
    fn false_boundary_prefix_is_replayed_into_data() {
        let body = b"--XYZ\r\nX-A: 1\r\n\r\nA\r\n--XQB\r\n--XYZ--\r\n";
        let events = coalesced(run(ONE_PART_TYPE, &[body]));
        assert_eq!(
            events,
            vec![
                Recorded::Start(ONE_PART_TYPE.to_owned()),
                Recorded::SubHeader(vec![("X-A".to_owned(), "1".to_owned())]),
                Recorded::Data(b"A\r\n--XQB".to_vec()),
                Recorded::DataEnd,
                Recorded::Terminate,
            ]
        );
    }

    #[test]
    fn false_prefix_replay_survives_fragmentation() {
        let body = b"--XYZ\r\nX-A: 1\r\n\r\nA\r\n--XQB\r\n--XYZ--\r\n";
        assert_eq!(
            coalesced(run(ONE_PART_TYPE, &[body])),
            coalesced(run_fragmented(ONE_PART_TYPE, body)),
        );
    }

    #[test]
    fn oversized_part_flushes_in_blocks() {
        let payload = vec![b'x'; DATA_BUFFER_SIZE + 100];
        let mut body = b"--XYZ\r\nX-A: 1\r\n\r\n".to_vec();
        body.extend_from_slice(&payload);
        body.extend_from_slice(b"\r\n--XYZ--\r\n");

        let events = run(ONE_PART_TYPE, &[&body]);
        let blocks: Vec<&Vec<u8>> = events
            .iter()
            .filter_map(|e| match e {
                Recorded::Data(bytes) => Some(bytes),
                _ => None,
            })
            .collect();
        assert!(blocks.len() >= 2, "expected the data buffer to flush mid-part");
        let total: usize = blocks.iter().map(|b| b.len()).sum();
        assert_eq!(total, payload.len());
    }

    #[test]
    fn truncated_stream_still_ends_the_open_part() {
        let body = b"--XYZ\r\nX-A: 1\r\n\r\npartial";
        let events = run(ONE_PART_TYPE, &[body]);
        assert_eq!(
            &events[2..],
            &[Recorded::Data(b"partial".to_vec()), Recorded::DataEnd, Recorded::Terminate]
        );
    }

    #[test]
    fn trailing_half_matched_boundary_is_dropped() {
        let body = b"--XYZ\r\nX-A: 1\r\n\r\nABC\r\n--XY";
        let events = run(ONE_PART_TYPE, &[body]);
        assert_eq!(
            &events[2..],
            &[Recorded::Data(b"ABC".to_vec()), Recorded::DataEnd, Recorded::Terminate]
        );
    }

    #[test]
    fn empty_chunk_terminates_like_none() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stream = MultipartStream::new(ONE_PART_TYPE, recorder(&log));
        stream.receive(Some(ONE_PART_BODY));
        stream.receive(Some(b""));
        // a second terminator must not replay the tail events
        stream.receive(None);
        stream.receive(Some(b"late bytes"));
        drop(stream);

        let events = Rc::try_unwrap(log).unwrap().into_inner();
        assert_eq!(events.last(), Some(&Recorded::Terminate));
        assert_eq!(events.iter().filter(|e| **e == Recorded::Terminate).count(), 1);
    }

    #[test]
    fn non_multipart_body_passes_through() {
        let events = run("application/octet-stream", &[b"raw ", b"bytes"]);
        assert_eq!(
            events,
            vec![
                Recorded::Start("application/octet-stream".to_owned()),
                Recorded::DataStart,
                Recorded::Data(b"raw ".to_vec()),
                Recorded::Data(b"bytes".to_vec()),
                Recorded::DataEnd,
                Recorded::Terminate,
            ]
        );
    }

    #[test]
    fn empty_content_type_passes_through() {
        let events = run("", &[b"x"]);
        assert_eq!(events[1], Recorded::DataStart);
        assert_eq!(events.last(), Some(&Recorded::Terminate));
    }

    #[test]
    fn multipart_prefix_is_case_insensitive() {
        // armed as multipart: no passthrough DataStart, and with no
        // boundary ever matching, the whole body is dropped as preamble
        let events = run("MULTIPART/form-data; boundary=Q", &[b"no boundary here"]);
        assert_eq!(
            events,
            vec![
                Recorded::Start("MULTIPART/form-data; boundary=Q".to_owned()),
                Recorded::Terminate,
            ]
        );
    }

    #[test]
    fn boundary_value_runs_to_end_of_string() {
        // the value is not cut at `;`, so the wire token `--XYZ` can
        // never match and the body stays preamble
        let content_type = "multipart/form-data; boundary=XYZ; charset=utf-8";
        let events = run(content_type, &[ONE_PART_BODY]);
        assert_eq!(
            events,
            vec![Recorded::Start(content_type.to_owned()), Recorded::Terminate]
        );
    }

    #[test]
    fn empty_part_header_yields_no_fields() {
        let body = b"--XYZ\r\n\r\nDATA\r\n--XYZ--\r\n";
        let events = coalesced(run(ONE_PART_TYPE, &[body]));
        assert_eq!(
            &events[1..],
            &[
                Recorded::SubHeader(vec![]),
                Recorded::Data(b"DATA".to_vec()),
                Recorded::DataEnd,
                Recorded::Terminate,
            ]
        );
    }
}
