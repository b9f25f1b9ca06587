//! Body framing model and the consumer seam.

/// How the end of the request body is determined.
///
/// Derived from the framing headers in declaration order: the first
/// `Content-Length` selects [`Length`], a `Transfer-Encoding` containing
/// `chunked` overrides it with [`Chunked`], and a request carrying
/// neither falls back to [`UntilClose`]. [`None`] is only produced by
/// [`Default`] before a header has been parsed.
///
/// [`Length`]: BodyKind::Length
/// [`Chunked`]: BodyKind::Chunked
/// [`UntilClose`]: BodyKind::UntilClose
/// [`None`]: BodyKind::None
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyKind {
    /// no body phase at all
    #[default]
    None,
    /// the body runs until the peer closes its write side
    UntilClose,
    /// exactly this many bytes follow the header
    Length(u64),
    /// the body arrives as `Transfer-Encoding: chunked` frames
    Chunked,
}

impl BodyKind {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn is_until_close(&self) -> bool {
        matches!(self, Self::UntilClose)
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self, Self::Chunked)
    }
}

/// Consumer of decoded request body bytes.
///
/// The framing layer calls [`receive`] with `Some(chunk)` for each run of
/// payload bytes, in order and without framing metadata, and with `None`
/// exactly once when the body is complete. The slice borrows the receive
/// buffer and is only valid for the duration of the call; a sink that
/// needs the bytes later must copy them.
///
/// A request without an installed sink has its body decoded and
/// discarded, which keeps framing intact for the response phase.
///
/// [`receive`]: BodySink::receive
pub trait BodySink {
    fn receive(&mut self, data: Option<&[u8]>);
}

impl<F> BodySink for F
where
    F: FnMut(Option<&[u8]>),
{
    fn receive(&mut self, data: Option<&[u8]>) {
        self(data);
    }
}
