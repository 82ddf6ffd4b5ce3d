// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request-line and header-block parsing.
//!
//! The connection loop hands this module one complete head (everything up
//! to and including the blank line); parsing is pure. Field names are kept
//! as received and matched case-insensitively by the header map; values
//! are trimmed of optional whitespace. Obsolete line folding is rejected,
//! as is whitespace between a field name and the colon (RFC 7230 §3.2.4).

use drover_core::{HeaderMap, Method, Version};
use thiserror::Error;

/// Parsed request head.
#[derive(Debug)]
pub(crate) struct Head {
    pub method: Method,
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ParseError {
    #[error("malformed request: {0}")]
    Malformed(&'static str),

    /// An `HTTP/x.y` version other than 1.0/1.1; answered with 505.
    #[error("unsupported protocol version")]
    UnsupportedVersion,
}

/// Parse a complete head, including the trailing `\r\n\r\n`.
pub(crate) fn parse_request_head(head: &[u8]) -> Result<Head, ParseError> {
    let text = std::str::from_utf8(head)
        .map_err(|_| ParseError::Malformed("head is not valid UTF-8"))?;

    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or(ParseError::Malformed("empty head"))?;
    let (method, target, version) = parse_request_line(request_line)?;

    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            return Err(ParseError::Malformed("obsolete line folding"));
        }
        let (name, value) =
            line.split_once(':').ok_or(ParseError::Malformed("header without colon"))?;
        if name.is_empty() || !name.bytes().all(is_tchar) {
            return Err(ParseError::Malformed("invalid header field name"));
        }
        headers.append(name, value.trim_matches([' ', '\t']));
    }

    Ok(Head { method, target: target.to_string(), version, headers })
}

fn parse_request_line(line: &str) -> Result<(Method, &str, Version), ParseError> {
    let mut parts = line.split(' ');
    let method_token = parts.next().ok_or(ParseError::Malformed("missing method"))?;
    let target = parts.next().ok_or(ParseError::Malformed("missing request target"))?;
    let version_token = parts.next().ok_or(ParseError::Malformed("missing protocol version"))?;
    if parts.next().is_some() {
        return Err(ParseError::Malformed("extra tokens in request line"));
    }

    if method_token.is_empty() || !method_token.bytes().all(is_tchar) {
        return Err(ParseError::Malformed("invalid method token"));
    }
    if !(target.starts_with('/') || target == "*") {
        return Err(ParseError::Malformed("request target must be absolute"));
    }

    let version = match version_token {
        "HTTP/1.1" => Version::Http11,
        "HTTP/1.0" => Version::Http10,
        v if is_http_version_shape(v) => return Err(ParseError::UnsupportedVersion),
        _ => return Err(ParseError::Malformed("invalid protocol version")),
    };

    Ok((Method::from_token(method_token), target, version))
}

/// `HTTP/<digit>.<digit>` but not a version we serve.
fn is_http_version_shape(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 8
        && bytes.starts_with(b"HTTP/")
        && bytes[5].is_ascii_digit()
        && bytes[6] == b'.'
        && bytes[7].is_ascii_digit()
}

fn is_tchar(byte: u8) -> bool {
    matches!(byte,
        b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9'
        | b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.'
        | b'^' | b'_' | b'`' | b'|' | b'~')
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
