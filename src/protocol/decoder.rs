//! Reply decoder
//!
//! Incremental, resumable parser turning a byte stream into [`Reply`] values.
//!
//! ## Wire Format
//! ```text
//! +<text>\r\n                     simple string
//! -<CLASS> <message>\r\n          error
//! :<i64>\r\n                      integer
//! $<len>\r\n<len bytes>\r\n       bulk string ($-1 = null)
//! *<count>\r\n<count replies>     array (*-1 = null, may nest)
//! ```
//!
//! Bytes may be fed at any boundary. Each loop iteration consumes either one
//! line or one declared bulk payload; when neither is fully buffered the
//! decoder returns `None` and resumes on the next feed. Open arrays live on an
//! explicit frame stack, so nesting depth never maps to call depth.

use bytes::{Buf, BytesMut};
use thiserror::Error;

use super::Reply;

const CRLF: &[u8] = b"\r\n";

/// Default bulk payload limit (512 MB)
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Default array element limit
pub const DEFAULT_MAX_ARRAY_LEN: usize = 16 * 1024 * 1024;

/// Default limit for a status, error, integer or length line (64 KB)
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Upper bound on capacity reserved up front for a declared array
const MAX_PREALLOC: usize = 1024;

/// Malformed framing for a single reply slot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("cannot convert '{0}' to integer")]
    InvalidInteger(String),

    #[error("invalid {kind} length '{raw}'")]
    InvalidLength { kind: &'static str, raw: String },

    #[error("unknown reply type byte 0x{0:02x}")]
    UnknownType(u8),

    #[error("bulk payload not terminated by CRLF")]
    MissingTerminator,

    #[error("{kind} of {len} exceeds limit of {max}")]
    TooLarge {
        kind: &'static str,
        len: usize,
        max: usize,
    },
}

/// Outcome of one top-level reply slot
pub type Decoded = std::result::Result<Reply, ProtocolError>;

/// Size limits applied while decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderLimits {
    pub max_bulk_len: usize,
    pub max_array_len: usize,
    /// Longest line accepted, CRLF excluded
    pub max_line_len: usize,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        Self {
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_array_len: DEFAULT_MAX_ARRAY_LEN,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

/// An array still waiting for elements
#[derive(Debug)]
struct Frame {
    remaining: usize,
    items: Vec<Reply>,
    /// First element failure; later elements are consumed and dropped
    error: Option<ProtocolError>,
}

impl Frame {
    fn new(count: usize, error: Option<ProtocolError>) -> Self {
        let capacity = if error.is_some() { 0 } else { count.min(MAX_PREALLOC) };
        Self {
            remaining: count,
            items: Vec::with_capacity(capacity),
            error,
        }
    }

    fn push(&mut self, element: Decoded) {
        self.remaining -= 1;
        match element {
            Ok(reply) if self.error.is_none() => self.items.push(reply),
            Ok(_) => {}
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(err);
                    self.items = Vec::new();
                }
            }
        }
    }

    fn finish(self) -> Decoded {
        match self.error {
            Some(err) => Err(err),
            None => Ok(Reply::Array(Some(self.items))),
        }
    }
}

/// Result of interpreting one line
enum Unit {
    /// A complete element
    Complete(Decoded),
    /// Header consumed, more input needed before an element exists
    Pending,
}

/// Per-connection decoding state machine
#[derive(Debug)]
pub struct ReplyDecoder {
    /// Unconsumed input
    buffer: BytesMut,

    /// Prefix of `buffer` already searched for CRLF
    scanned: usize,

    /// Declared length of the bulk payload being awaited
    bulk: Option<usize>,

    /// Bytes of an oversized payload still to skip
    discard: usize,

    /// Dropping the rest of an overlong line, up to its CRLF
    skip_line: bool,

    /// Open arrays, innermost last
    stack: Vec<Frame>,

    limits: DecoderLimits,
}

impl Default for ReplyDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyDecoder {
    /// Create a decoder with default limits
    pub fn new() -> Self {
        Self::with_limits(DecoderLimits::default())
    }

    pub fn with_limits(limits: DecoderLimits) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            scanned: 0,
            bulk: None,
            discard: 0,
            skip_line: false,
            stack: Vec::new(),
            limits,
        }
    }

    /// Append received bytes
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Feed `data` and iterate over every reply it completes
    pub fn decode(&mut self, data: &[u8]) -> Replies<'_> {
        self.feed(data);
        Replies { decoder: self }
    }

    /// Drop all buffered input and partial state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.bulk = None;
        self.discard = 0;
        self.skip_line = false;
        self.stack.clear();
    }

    /// Number of buffered, unconsumed bytes
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// True when no reply is partially decoded
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
            && self.bulk.is_none()
            && self.discard == 0
            && !self.skip_line
            && self.stack.is_empty()
    }

    /// Decode the next complete top-level reply, if the buffer holds one
    pub fn next_reply(&mut self) -> Option<Decoded> {
        loop {
            if self.discard > 0 {
                let n = self.discard.min(self.buffer.len());
                self.buffer.advance(n);
                self.discard -= n;
                self.scanned = 0;
                if self.discard > 0 {
                    return None;
                }
            }

            if self.skip_line && !self.skip_to_line_end() {
                return None;
            }

            let element = match self.bulk {
                Some(len) => self.take_payload(len)?,
                None => match self.take_line()? {
                    Ok(line) if line.is_empty() => continue,
                    Ok(line) => match self.parse_line(&line) {
                        Unit::Complete(element) => element,
                        Unit::Pending => continue,
                    },
                    Err(err) => Err(err),
                },
            };

            if let Some(reply) = self.attach(element) {
                return Some(reply);
            }
        }
    }

    /// Split off the next CRLF-terminated line, without the terminator
    ///
    /// A line longer than `max_line_len` fails its slot; whatever is left of
    /// it is dropped as it arrives.
    fn take_line(&mut self) -> Option<Result<BytesMut, ProtocolError>> {
        // A CR may sit at the end of the previously scanned region
        let start = self.scanned.saturating_sub(1);
        let found = find_crlf(&self.buffer[start..]).map(|pos| start + pos);
        let max = self.limits.max_line_len;

        match found {
            Some(pos) if pos > max => {
                self.buffer.advance(pos + CRLF.len());
                self.scanned = 0;
                Some(Err(line_too_long(pos, max)))
            }
            Some(pos) => {
                let line = self.buffer.split_to(pos);
                self.buffer.advance(CRLF.len());
                self.scanned = 0;
                Some(Ok(line))
            }
            // One extra byte for a CR whose LF has not arrived yet
            None if self.buffer.len() > max + 1 => {
                let len = self.buffer.len();
                self.skip_line = true;
                self.skip_to_line_end();
                Some(Err(line_too_long(len, max)))
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// Drop input up to and including the next CRLF
    ///
    /// Returns false while the CRLF has not arrived.
    fn skip_to_line_end(&mut self) -> bool {
        self.scanned = 0;
        match find_crlf(&self.buffer) {
            Some(pos) => {
                self.buffer.advance(pos + CRLF.len());
                self.skip_line = false;
                true
            }
            None => {
                let keep = usize::from(self.buffer.last() == Some(&b'\r'));
                let drop = self.buffer.len() - keep;
                self.buffer.advance(drop);
                false
            }
        }
    }

    /// Take a declared bulk payload plus its CRLF once fully buffered
    fn take_payload(&mut self, len: usize) -> Option<Decoded> {
        if self.buffer.len() < len + CRLF.len() {
            return None;
        }

        let data = self.buffer.split_to(len).freeze();
        let terminated = &self.buffer[..CRLF.len()] == CRLF;
        self.buffer.advance(CRLF.len());
        self.bulk = None;
        self.scanned = 0;

        if terminated {
            Some(Ok(Reply::BulkString(Some(data))))
        } else {
            Some(Err(ProtocolError::MissingTerminator))
        }
    }

    fn parse_line(&mut self, line: &[u8]) -> Unit {
        let body = &line[1..];
        match line[0] {
            b'+' => Unit::Complete(Ok(Reply::SimpleString(
                String::from_utf8_lossy(body).into_owned(),
            ))),
            b'-' => Unit::Complete(Ok(Reply::Error(super::ServerError::parse(body)))),
            b':' => Unit::Complete(
                parse_i64(body)
                    .map(Reply::Integer)
                    .ok_or_else(|| ProtocolError::InvalidInteger(lossy(body))),
            ),
            b'$' => match parse_length(body, "bulk") {
                Err(err) => Unit::Complete(Err(err)),
                Ok(None) => Unit::Complete(Ok(Reply::BulkString(None))),
                Ok(Some(len)) if len > self.limits.max_bulk_len => {
                    self.discard = len + CRLF.len();
                    Unit::Complete(Err(ProtocolError::TooLarge {
                        kind: "bulk string",
                        len,
                        max: self.limits.max_bulk_len,
                    }))
                }
                Ok(Some(len)) => {
                    self.bulk = Some(len);
                    Unit::Pending
                }
            },
            b'*' => match parse_length(body, "array") {
                Err(err) => Unit::Complete(Err(err)),
                Ok(None) => Unit::Complete(Ok(Reply::Array(None))),
                Ok(Some(0)) => Unit::Complete(Ok(Reply::Array(Some(Vec::new())))),
                Ok(Some(count)) => {
                    let error = (count > self.limits.max_array_len).then(|| ProtocolError::TooLarge {
                        kind: "array",
                        len: count,
                        max: self.limits.max_array_len,
                    });
                    self.stack.push(Frame::new(count, error));
                    Unit::Pending
                }
            },
            other => Unit::Complete(Err(ProtocolError::UnknownType(other))),
        }
    }

    /// Hand an element to the innermost open array, closing every frame it
    /// completes. Returns the reply once nothing is left open.
    fn attach(&mut self, mut element: Decoded) -> Option<Decoded> {
        loop {
            let frame = match self.stack.last_mut() {
                Some(frame) => frame,
                None => return Some(element),
            };
            frame.push(element);
            if frame.remaining > 0 {
                return None;
            }
            element = match self.stack.pop() {
                Some(frame) => frame.finish(),
                None => return None,
            };
        }
    }
}

/// Lazy sequence of replies completed by a feed
pub struct Replies<'a> {
    decoder: &'a mut ReplyDecoder,
}

impl Iterator for Replies<'_> {
    type Item = Decoded;

    fn next(&mut self) -> Option<Decoded> {
        self.decoder.next_reply()
    }
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == CRLF)
}

fn line_too_long(len: usize, max: usize) -> ProtocolError {
    ProtocolError::TooLarge {
        kind: "line",
        len,
        max,
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn parse_i64(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// `Ok(None)` for the -1 null marker
fn parse_length(bytes: &[u8], kind: &'static str) -> std::result::Result<Option<usize>, ProtocolError> {
    let invalid = || ProtocolError::InvalidLength {
        kind,
        raw: lossy(bytes),
    };
    match parse_i64(bytes) {
        Some(-1) => Ok(None),
        Some(n) if n >= 0 => usize::try_from(n).map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}
