//! Protocol-level message model.
//!
//! Owned request and response messages, the body framing model, and the
//! error taxonomy. The codec layer produces and consumes these; the
//! connection layer moves them through their lifecycle.

pub mod body;
pub mod error;
pub mod request;
pub mod response;

pub use body::{BodyKind, BodySink};
pub use error::{HttpError, ParseError, SendError};
pub use request::{HeaderField, Method, RequestMessage};
pub use response::{BodyProducer, ResponseMessage};
