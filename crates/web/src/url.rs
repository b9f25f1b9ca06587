//! Versioned URL decomposition.
//!
//! API urls follow `/apiversion/route/path:command?querystring`. The
//! leading slash and the version are mandatory; everything else is
//! optional and defaults to empty. Splitting happens in a fixed order
//! on the remainder after the version: `?` first, then `:`, then the
//! first `/` separating route from path. Route, path and command are
//! percent-decoded; parameter names and the raw querystring are kept
//! as sent, parameter values are decoded.

use tracing::trace;

/// Versions this parser accepts in the first segment.
pub const SUPPORTED_API_VERSIONS: &[&str] = &["v1"];

/// One `name=value` pair from the querystring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// The decomposed form of an API url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlComponents {
    pub apiversion: String,
    pub route: String,
    pub path: String,
    pub command: String,
    /// raw querystring, undecoded
    pub querystring: String,
    pub parameters: Vec<Parameter>,
}

impl UrlComponents {
    /// Decompose `url`. Returns `None` when the leading segment is not
    /// a supported api version.
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.strip_prefix('/').unwrap_or(url);
        let (apiversion, rest) = match url.split_once('/') {
            Some((version, rest)) => (version, rest),
            None => (url, ""),
        };
        if !SUPPORTED_API_VERSIONS.contains(&apiversion) {
            trace!(apiversion, "rejected unsupported api version");
            return None;
        }

        let (rest, querystring) = rest.split_once('?').unwrap_or((rest, ""));
        let (rest, command) = rest.split_once(':').unwrap_or((rest, ""));
        let (route, path) = rest.split_once('/').unwrap_or((rest, ""));

        Some(Self {
            apiversion: apiversion.to_owned(),
            route: url_decode(route),
            path: url_decode(path),
            command: url_decode(command),
            querystring: querystring.to_owned(),
            parameters: parse_querystring(querystring),
        })
    }
}

/// Percent-decode `input`, mapping `+` to space.
///
/// A `%` not followed by two hex digits is copied through as-is, so
/// malformed input degrades instead of failing.
pub fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut at = 0;
    while at < bytes.len() {
        match bytes[at] {
            b'%' => match hex_pair(bytes.get(at + 1), bytes.get(at + 2)) {
                Some(decoded) => {
                    out.push(decoded);
                    at += 3;
                }
                None => {
                    out.push(b'%');
                    at += 1;
                }
            },
            b'+' => {
                out.push(b' ');
                at += 1;
            }
            byte => {
                out.push(byte);
                at += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(high: Option<&u8>, low: Option<&u8>) -> Option<u8> {
    Some(hex_digit(*high?)? * 16 + hex_digit(*low?)?)
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Split a querystring into parameters.
///
/// Segments split on `&` and each on its first `=`. Empty segments
/// still count as parameters with empty name and value; this mirrors a
/// literal split, so `a&` produces two entries.
pub fn parse_querystring(querystring: &str) -> Vec<Parameter> {
    if querystring.is_empty() {
        return Vec::new();
    }
    querystring
        .split('&')
        .map(|segment| match segment.split_once('=') {
            Some((name, value)) => Parameter::new(name, url_decode(value)),
            None => Parameter::new(segment, ""),
        })
        .collect()
}
