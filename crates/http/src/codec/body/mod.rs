//! Request body framing decoders.
//!
//! One decoder per framing mode, selected by
//! [`BodyKind`](crate::protocol::body::BodyKind) and driven through the
//! [`BodyDecoder`] dispatcher. All of them deliver payload spans to the
//! request's sink and consume from the shared accumulator; none of them
//! copy body bytes.

mod chunked_decoder;
mod decoder;
mod length_decoder;
mod until_close_decoder;

pub use chunked_decoder::ChunkedDecoder;
pub use decoder::{BodyDecoder, FrameResult};
pub use length_decoder::LengthDecoder;
pub use until_close_decoder::UntilCloseDecoder;
