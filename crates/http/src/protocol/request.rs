//! Request-side message types.
//!
//! A [`RequestMessage`] is an owned snapshot of one parsed request head:
//! the request line, the field pairs in wire order, and the body framing
//! derived from them. Nothing borrows the receive buffer, so the message
//! stays valid while body bytes continue to stream through it.

use std::fmt;

use crate::protocol::body::{BodyKind, BodySink};

/// Request method.
///
/// Parsing matches the verb token by prefix in declaration order and
/// falls back to `Get` for anything unrecognized. `Unknown` only exists
/// as the pre-parse placeholder produced by [`Default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    #[default]
    Unknown,
}

impl Method {
    /// Match a request-line verb token.
    pub fn from_token(token: &str) -> Self {
        if token.starts_with("GET") {
            Self::Get
        } else if token.starts_with("POST") {
            Self::Post
        } else if token.starts_with("PUT") {
            Self::Put
        } else if token.starts_with("DELETE") {
            Self::Delete
        } else {
            Self::Get
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `name: value` pair, owned, with the wire spelling preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

impl HeaderField {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// A parsed request head plus the sink that will consume its body.
///
/// Fields keep their arrival order and duplicates are preserved;
/// [`field`] returns the first match, compared case-insensitively.
///
/// [`field`]: RequestMessage::field
#[derive(Default)]
pub struct RequestMessage {
    method: Method,
    uri: String,
    version: String,
    fields: Vec<HeaderField>,
    body_kind: BodyKind,
    sink: Option<Box<dyn BodySink + Send>>,
}

impl RequestMessage {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// All field pairs in wire order, duplicates included.
    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    /// First value whose name matches case-insensitively.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.field("content-type")
    }

    pub fn body_kind(&self) -> BodyKind {
        self.body_kind
    }

    pub fn has_body(&self) -> bool {
        !self.body_kind.is_none()
    }

    /// Install the consumer for the body bytes that follow this head.
    ///
    /// Meant to be called from the request callback, before any body
    /// bytes are decoded. Without a sink the body is read and discarded.
    pub fn set_body_sink<S>(&mut self, sink: S)
    where
        S: BodySink + Send + 'static,
    {
        self.sink = Some(Box::new(sink));
    }

    pub(crate) fn sink_mut(&mut self) -> Option<&mut (dyn BodySink + Send)> {
        match self.sink.as_deref_mut() {
            Some(sink) => Some(sink),
            None => None,
        }
    }

    pub(crate) fn set_request_line(&mut self, method: Method, uri: &str, version: &str) {
        self.method = method;
        self.uri = uri.to_owned();
        self.version = version.to_owned();
    }

    pub(crate) fn push_field(&mut self, name: &str, value: &str) {
        self.fields.push(HeaderField::new(name, value));
    }

    pub(crate) fn set_body_kind(&mut self, kind: BodyKind) {
        self.body_kind = kind;
    }
}

impl fmt::Debug for RequestMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMessage")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("version", &self.version)
            .field("fields", &self.fields)
            .field("body_kind", &self.body_kind)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_token_matches_by_prefix() {
        assert_eq!(Method::from_token("GET"), Method::Get);
        assert_eq!(Method::from_token("GETX"), Method::Get);
        assert_eq!(Method::from_token("POST"), Method::Post);
        assert_eq!(Method::from_token("PUT"), Method::Put);
        assert_eq!(Method::from_token("DELETE"), Method::Delete);
    }

    #[test]
    fn unrecognized_method_falls_back_to_get() {
        // Questionable leniency, but relied upon: anything unknown is
        // treated as a GET instead of being rejected.
        assert_eq!(Method::from_token("BREW"), Method::Get);
        assert_eq!(Method::from_token(""), Method::Get);
    }

    #[test]
    fn field_lookup_is_case_insensitive_first_match() {
        let mut request = RequestMessage::default();
        request.push_field("Accept", "text/html");
        request.push_field("X-Tag", "one");
        request.push_field("x-tag", "two");

        assert_eq!(request.field("accept"), Some("text/html"));
        assert_eq!(request.field("X-TAG"), Some("one"));
        assert_eq!(request.field("missing"), None);
        assert_eq!(request.fields().len(), 3);
    }

    #[test]
    fn sink_receives_through_the_message() {
        let mut request = RequestMessage::default();
        assert!(request.sink_mut().is_none());

        request.set_body_sink(|data: Option<&[u8]>| {
            assert_eq!(data, Some(&b"x"[..]));
        });
        let sink = request.sink_mut().unwrap();
        sink.receive(Some(b"x"));
    }
}
