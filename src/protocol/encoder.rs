//! Command encoder
//!
//! Serializes a command into the array-of-bulk-strings wire form:
//!
//! ```text
//! *<argc>\r\n
//! $<len>\r\n<bytes>\r\n      (once per argument, command name first)
//! ```
//!
//! The inline space-separated form is never produced.

use std::borrow::Cow;
use std::fmt::Write as _;

use bytes::{BufMut, Bytes, BytesMut};

use super::{Arg, Command};
use crate::error::{RedwireError, Result};

/// Text encoding applied to string arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Ascii => "ascii",
            TextEncoding::Latin1 => "latin-1",
        }
    }

    /// Highest code point the encoding represents as a single byte
    fn max_code_point(&self) -> Option<u32> {
        match self {
            TextEncoding::Utf8 => None,
            TextEncoding::Ascii => Some(0x7f),
            TextEncoding::Latin1 => Some(0xff),
        }
    }
}

/// Handling of characters the encoding cannot represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingErrors {
    /// Fail with `InvalidData`
    #[default]
    Strict,
    /// Substitute `?`
    Replace,
    /// Drop the character
    Ignore,
}

/// Stateless command serializer
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandEncoder {
    encoding: TextEncoding,
    errors: EncodingErrors,
}

impl CommandEncoder {
    pub fn new(encoding: TextEncoding, errors: EncodingErrors) -> Self {
        Self { encoding, errors }
    }

    /// Encode `name` followed by `args`
    ///
    /// Every argument is converted before any output is produced, so a
    /// failure never leaves a partial frame behind.
    pub fn encode(&self, name: &str, args: &[Arg]) -> Result<Bytes> {
        let mut parts = Vec::with_capacity(1 + args.len());
        parts.push(self.encode_text(name)?);
        for arg in args {
            parts.push(self.encode_arg(arg)?);
        }

        let payload: usize = parts.iter().map(|p| p.len() + 16).sum();
        let mut frame = BytesMut::with_capacity(16 + payload);
        write_header(&mut frame, b'*', parts.len());
        for part in &parts {
            write_header(&mut frame, b'$', part.len());
            frame.put_slice(part);
            frame.put_slice(b"\r\n");
        }
        Ok(frame.freeze())
    }

    pub fn encode_command(&self, command: &Command) -> Result<Bytes> {
        self.encode(command.name(), command.arguments())
    }

    /// Byte representation of one argument
    pub fn encode_arg<'a>(&self, arg: &'a Arg) -> Result<Cow<'a, [u8]>> {
        match arg {
            Arg::Bytes(data) => Ok(Cow::Borrowed(data.as_ref())),
            Arg::Text(text) => self.encode_text(text),
            Arg::Int(n) => Ok(Cow::Owned(n.to_string().into_bytes())),
            Arg::UInt(n) => Ok(Cow::Owned(n.to_string().into_bytes())),
            Arg::Float(n) => Ok(Cow::Owned(n.to_string().into_bytes())),
        }
    }

    /// Encode text with the configured encoding
    pub fn encode_text<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>> {
        let max = match self.encoding.max_code_point() {
            None => return Ok(Cow::Borrowed(text.as_bytes())),
            Some(max) => max,
        };
        if text.is_ascii() {
            return Ok(Cow::Borrowed(text.as_bytes()));
        }

        let mut out = Vec::with_capacity(text.len());
        for (index, ch) in text.chars().enumerate() {
            let code = u32::from(ch);
            if code <= max {
                out.push(code as u8);
                continue;
            }
            match self.errors {
                EncodingErrors::Strict => {
                    return Err(RedwireError::InvalidData(format!(
                        "cannot encode {:?} in '{}' at position {} as {}",
                        ch,
                        text.escape_default(),
                        index,
                        self.encoding.name()
                    )))
                }
                EncodingErrors::Replace => out.push(b'?'),
                EncodingErrors::Ignore => {}
            }
        }
        Ok(Cow::Owned(out))
    }
}

fn write_header(frame: &mut BytesMut, tag: u8, len: usize) {
    frame.put_u8(tag);
    // Writing into BytesMut cannot fail
    let _ = write!(frame, "{}", len);
    frame.put_slice(b"\r\n");
}
