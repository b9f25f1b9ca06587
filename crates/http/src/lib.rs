//! An embeddable HTTP/1.1 server core with fixed, predictable resource
//! use.
//!
//! The crate serves the niche where a process wants to speak just
//! enough HTTP to be poked at, without pulling in a framework: a fixed
//! number of connection slots, one bounded receive buffer per slot, and
//! decoders that make progress on whatever fragment of input has
//! arrived. Requests are handled one per connection and every response
//! ends with a close.
//!
//! The layers stack bottom up:
//!
//! * [`codec`] turns fragmented reads into a parsed request head and a
//!   streamed body, via a cursor-managed receive accumulator.
//! * [`multipart`] is an optional body sink that re-frames a
//!   `multipart/form-data` body into part events, one byte automaton,
//!   no lookahead.
//! * [`connection`] is the per-request state machine, free of I/O and
//!   drivable byte by byte in tests.
//! * [`server`] is the tokio shell: a slot pool and an accept loop that
//!   defers new peers to the kernel backlog when all slots are busy.
//!
//! ```no_run
//! use http::StatusCode;
//! use pocket_http::handler::make_handler;
//! use pocket_http::server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let handler = make_handler(|_request, response| {
//!         response.set_status(StatusCode::OK);
//!         response.add_field("Content-Type", "text/plain");
//!         response.append_body(b"hello\n");
//!     });
//!     let server = Server::bind("127.0.0.1:8080", handler, ServerConfig::default()).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod handler;
pub mod multipart;
pub mod protocol;
pub mod server;
mod utils;
