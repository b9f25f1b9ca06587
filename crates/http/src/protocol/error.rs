//! Error types for the protocol engine.
//!
//! Errors split along the two halves of an exchange: [`ParseError`] covers
//! the read and decode path, [`SendError`] the write path, and
//! [`HttpError`] wraps both at the connection level. Every variant is
//! fatal for its connection. Incomplete input is never an error; the
//! decoders report it by returning `None` / `NeedMore` instead.

use std::io;

use thiserror::Error;

/// Connection-level error covering both directions of the exchange.
#[derive(Error, Debug)]
pub enum HttpError {
    /// error while reading or parsing the request
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    /// error while writing the response
    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

/// Errors raised while decoding the request head or body.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// the header region filled up without a `\r\n\r\n` terminator
    #[error("header exceeds limit, received {current_size} bytes, max {max_size} bytes")]
    TooLargeHeader { current_size: usize, max_size: usize },

    /// the `Content-Length` value is not a plain decimal number
    #[error("invalid content-length: {reason}")]
    InvalidContentLength { reason: String },

    /// a chunk size line cannot be decoded
    #[error("invalid chunk size line: {reason}")]
    InvalidChunkSize { reason: String },

    /// the peer closed the connection before the message completed
    #[error("connection closed before the message completed")]
    UnexpectedEof,

    /// transport failure while receiving
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn invalid_content_length<S: Into<String>>(reason: S) -> Self {
        Self::InvalidContentLength { reason: reason.into() }
    }

    pub fn invalid_chunk_size<S: Into<String>>(reason: S) -> Self {
        Self::InvalidChunkSize { reason: reason.into() }
    }

    pub fn io(source: io::Error) -> Self {
        Self::Io { source }
    }
}

/// Errors raised while writing the response.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SendError {
    /// transport failure while sending
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn io(source: io::Error) -> Self {
        Self::Io { source }
    }
}
