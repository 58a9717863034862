//! Incremental HTTP/1.x request parser.
//!
//! # Responsibilities
//! - Parse the request line, header block and `Content-Length` body
//! - Resume across calls as the connection buffer grows
//! - Distinguish "need more bytes" from malformed and unsupported input
//!
//! # Phases
//! ```text
//! Init → RequestLine → Headers → Body
//! ```
//! Phases only move forward. Every phase may be re-entered any number of
//! times with a longer buffer whose prefix is unchanged.
//!
//! # Design Decisions
//! - No I/O: the parser only reads the slice it is given
//! - Method, path and the raw header block are owned copies, so the
//!   caller's buffer is free to reallocate between calls
//! - The body is kept as a range into the caller's buffer, never copied
//! - The declared body size is checked against the ceiling before any
//!   body byte is required

use std::ops::Range;

use thiserror::Error;

/// Request methods accepted on the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
    Options,
    Connect,
    Trace,
}

impl Method {
    const ALL: [Method; 9] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Head,
        Method::Patch,
        Method::Options,
        Method::Connect,
        Method::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
        }
    }

    /// Match the method literal plus its trailing space at the start of a line.
    fn from_line_prefix(line: &[u8]) -> Option<Method> {
        Self::ALL.into_iter().find(|method| {
            let name = method.as_str().as_bytes();
            line.starts_with(name) && line.get(name.len()) == Some(&b' ')
        })
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol version from the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    fn from_token(token: &[u8]) -> Option<Version> {
        match token {
            b"HTTP/1.1" => Some(Version::Http11),
            b"HTTP/1.0" => Some(Version::Http10),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

/// Parser phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    RequestLine,
    Headers,
    Body,
}

/// How the body length is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Length(usize),
    Chunked,
}

/// Why a request was rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown request method")]
    UnknownMethod,

    #[error("missing request path")]
    MissingPath,

    #[error("unsupported protocol version")]
    UnsupportedVersion,

    /// A second `Content-Length` or `Transfer-Encoding` header.
    #[error("ambiguous message framing")]
    DuplicateFraming,

    #[error("invalid content-length")]
    InvalidContentLength,

    #[error("declared body of {declared} bytes exceeds limit of {limit}")]
    BodyTooLarge { declared: usize, limit: usize },
}

/// Result of one parser invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The buffer holds an incomplete request.
    More,
    /// The request, including its body, is complete.
    Done,
    /// The request is malformed.
    Error(ParseError),
    /// The request uses framing this server does not support.
    NotImplemented,
}

/// A borrowed view of a completed request.
#[derive(Debug, Clone, Copy)]
pub struct ParsedRequest<'a> {
    pub method: Method,
    pub path: &'a [u8],
    pub version: Version,
    pub headers_raw: &'a [u8],
    pub body: &'a [u8],
}

/// Resumable parser state for one connection.
#[derive(Debug, Clone)]
pub struct RequestParser {
    max_body_size: usize,
    phase: Phase,
    cursor: usize,
    /// Bytes from `cursor` up to here are known to hold no line feed.
    scanned: usize,
    headers_start: usize,
    method: Option<Method>,
    path: Vec<u8>,
    version: Option<Version>,
    framing: Option<Framing>,
    content_length: usize,
    headers_raw: Vec<u8>,
    body: Option<Range<usize>>,
}

impl RequestParser {
    /// Create a parser that rejects declared bodies above `max_body_size`.
    pub fn new(max_body_size: usize) -> Self {
        Self {
            max_body_size,
            phase: Phase::Init,
            cursor: 0,
            scanned: 0,
            headers_start: 0,
            method: None,
            path: Vec::new(),
            version: None,
            framing: None,
            content_length: 0,
            headers_raw: Vec::new(),
            body: None,
        }
    }

    /// Parse as much of `buf` as possible.
    ///
    /// `buf` must be the whole request received so far; successive calls
    /// must pass a buffer whose prefix matches the previous one.
    pub fn parse(&mut self, buf: &[u8]) -> Verdict {
        if self.phase == Phase::Init {
            self.cursor = 0;
            self.phase = Phase::RequestLine;
        }

        if self.phase == Phase::RequestLine {
            match self.parse_request_line(buf) {
                Ok(true) => {}
                Ok(false) => return Verdict::More,
                Err(e) => return Verdict::Error(e),
            }
        }

        if self.phase == Phase::Headers {
            match self.parse_headers(buf) {
                Ok(true) => {}
                Ok(false) => return Verdict::More,
                Err(e) => return Verdict::Error(e),
            }
        }

        self.parse_body(buf)
    }

    /// Find the end of the line at `cursor`, examining each byte only once
    /// across calls.
    fn next_line_end(&mut self, buf: &[u8]) -> Option<usize> {
        let from = self.scanned.max(self.cursor);
        let end = find_newline(buf, from);
        if end.is_none() {
            self.scanned = buf.len();
        }
        end
    }

    fn parse_request_line(&mut self, buf: &[u8]) -> Result<bool, ParseError> {
        let Some(end) = self.next_line_end(buf) else {
            return Ok(false);
        };
        let line = &buf[self.cursor..end];

        let method = Method::from_line_prefix(line).ok_or(ParseError::UnknownMethod)?;
        let rest = line[method.as_str().len()..].trim_ascii_start();

        let path_len = rest
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .unwrap_or(rest.len());
        if path_len == 0 {
            return Err(ParseError::MissingPath);
        }
        let (path, rest) = rest.split_at(path_len);

        let version = Version::from_token(rest.trim_ascii()).ok_or(ParseError::UnsupportedVersion)?;

        self.method = Some(method);
        self.path = path.to_vec();
        self.version = Some(version);
        self.cursor = end + 1;
        self.headers_start = self.cursor;
        self.phase = Phase::Headers;
        Ok(true)
    }

    fn parse_headers(&mut self, buf: &[u8]) -> Result<bool, ParseError> {
        loop {
            let Some(end) = self.next_line_end(buf) else {
                return Ok(false);
            };
            let line = &buf[self.cursor..end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            if line.is_empty() {
                self.headers_raw = buf[self.headers_start..self.cursor].to_vec();
                self.content_length = match self.framing {
                    Some(Framing::Length(n)) => n,
                    _ => 0,
                };
                self.cursor = end + 1;
                self.phase = Phase::Body;
                return Ok(true);
            }

            // Lines without a colon are tolerated and skipped.
            if let Some(colon) = line.iter().position(|&b| b == b':') {
                self.record_header(line[..colon].trim_ascii(), line[colon + 1..].trim_ascii())?;
            }

            self.cursor = end + 1;
        }
    }

    fn record_header(&mut self, name: &[u8], value: &[u8]) -> Result<(), ParseError> {
        let is_length = name.eq_ignore_ascii_case(b"content-length");
        if !is_length && !name.eq_ignore_ascii_case(b"transfer-encoding") {
            return Ok(());
        }
        if self.framing.is_some() {
            return Err(ParseError::DuplicateFraming);
        }

        self.framing = Some(if is_length {
            Framing::Length(parse_content_length(value)?)
        } else {
            Framing::Chunked
        });
        Ok(())
    }

    fn parse_body(&mut self, buf: &[u8]) -> Verdict {
        if self.framing == Some(Framing::Chunked) {
            return Verdict::NotImplemented;
        }

        let len = self.content_length;
        if len == 0 {
            self.body = Some(self.cursor..self.cursor);
            return Verdict::Done;
        }
        if len > self.max_body_size {
            return Verdict::Error(ParseError::BodyTooLarge {
                declared: len,
                limit: self.max_body_size,
            });
        }
        if buf.len().saturating_sub(self.cursor) < len {
            return Verdict::More;
        }

        self.body = Some(self.cursor..self.cursor + len);
        Verdict::Done
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn method(&self) -> Option<Method> {
        self.method
    }

    /// The request target, empty until the request line is parsed.
    pub fn path(&self) -> &[u8] {
        &self.path
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    /// Declared body length; zero until the header block is complete.
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Header lines exactly as received, empty until the block is complete.
    pub fn headers_raw(&self) -> &[u8] {
        &self.headers_raw
    }

    /// The received body, or `None` when there is none (or it is incomplete).
    pub fn body<'b>(&self, buf: &'b [u8]) -> Option<&'b [u8]> {
        self.body
            .clone()
            .filter(|range| !range.is_empty())
            .and_then(|range| buf.get(range))
    }

    /// A view of the completed request, or `None` before [`Verdict::Done`].
    pub fn request<'a>(&'a self, buf: &'a [u8]) -> Option<ParsedRequest<'a>> {
        let range = self.body.clone()?;
        Some(ParsedRequest {
            method: self.method?,
            path: &self.path,
            version: self.version?,
            headers_raw: &self.headers_raw,
            body: buf.get(range)?,
        })
    }
}

fn find_newline(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| from + i)
}

fn parse_content_length(value: &[u8]) -> Result<usize, ParseError> {
    if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
        return Err(ParseError::InvalidContentLength);
    }
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(ParseError::InvalidContentLength)
}
