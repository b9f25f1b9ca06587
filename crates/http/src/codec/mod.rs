//! Incremental decoders over the receive accumulator.
//!
//! The codec layer turns fragmented socket reads into protocol events:
//! [`HeaderDecoder`] produces one parsed request head, and the
//! [`body`] decoders stream the payload that follows it. All of them
//! share one [`Accumulator`] per connection and make progress with
//! whatever happens to be buffered, so a peer can dribble bytes one at
//! a time without changing any observable outcome.

pub mod accumulator;
pub mod body;
pub mod header_decoder;

pub use accumulator::Accumulator;
pub use body::{BodyDecoder, FrameResult};
pub use header_decoder::{HeaderDecoder, DEFAULT_MAX_HEADER_SIZE};
