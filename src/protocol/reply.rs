//! Reply definitions
//!
//! Wire-shaped values produced by the decoder. No coercion happens here.

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

/// A fully decoded reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+` status line, e.g. "OK"
    SimpleString(String),

    /// `-` server error
    Error(ServerError),

    /// `:` signed integer
    Integer(i64),

    /// `$` length-prefixed blob; `None` for `$-1`
    BulkString(Option<Bytes>),

    /// `*` ordered sequence, possibly nested; `None` for `*-1`
    Array(Option<Vec<Reply>>),
}

impl Reply {
    /// Build a bulk string reply from anything byte-like
    pub fn bulk(data: impl AsRef<[u8]>) -> Self {
        Reply::BulkString(Some(Bytes::copy_from_slice(data.as_ref())))
    }

    /// Build a status reply
    pub fn status(text: impl Into<String>) -> Self {
        Reply::SimpleString(text.into())
    }

    /// Null bulk or null array
    pub fn is_null(&self) -> bool {
        matches!(self, Reply::BulkString(None) | Reply::Array(None))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Raw payload of a bulk or status reply
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Reply::BulkString(Some(data)) => Some(data),
            Reply::SimpleString(text) => Some(text.as_bytes()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Elements of a non-null array
    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(Some(items)) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::SimpleString(_) => "simple string",
            Reply::Error(_) => "error",
            Reply::Integer(_) => "integer",
            Reply::BulkString(None) => "null bulk string",
            Reply::BulkString(Some(_)) => "bulk string",
            Reply::Array(None) => "null array",
            Reply::Array(Some(_)) => "array",
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        match self {
            Reply::SimpleString(text) => f.write_str(text),
            Reply::Error(err) => write!(f, "(error) {}", err.line()),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::BulkString(None) | Reply::Array(None) => f.write_str("(nil)"),
            Reply::BulkString(Some(data)) => write!(f, "\"{}\"", data.escape_ascii()),
            Reply::Array(Some(items)) if items.is_empty() => f.write_str("(empty array)"),
            Reply::Array(Some(items)) => {
                let width = items.len().to_string().len();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                        write!(f, "{:indent$}", "", indent = indent)?;
                    }
                    write!(f, "{:>width$}) ", i + 1, width = width)?;
                    item.fmt_indented(f, indent + width + 2)?;
                }
                Ok(())
            }
        }
    }
}

/// redis-cli style rendering
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Error class tokens that are stripped from `-` replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Err,
    NoScript,
    NotBusy,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Err => "ERR",
            ErrorClass::NoScript => "NOSCRIPT",
            ErrorClass::NotBusy => "NOTBUSY",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "ERR" => Some(ErrorClass::Err),
            "NOSCRIPT" => Some(ErrorClass::NoScript),
            "NOTBUSY" => Some(ErrorClass::NotBusy),
            _ => None,
        }
    }
}

/// A `-` reply from the server
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServerError {
    class: Option<ErrorClass>,
    message: String,
}

impl ServerError {
    pub fn new(class: Option<ErrorClass>, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    /// Parse the body of a `-` line (type byte already removed)
    pub fn parse(line: &[u8]) -> Self {
        let text = String::from_utf8_lossy(line);
        if let Some((token, rest)) = text.split_once(' ') {
            if let Some(class) = ErrorClass::from_token(token) {
                return Self::new(Some(class), rest);
            }
        }
        Self::new(None, text.into_owned())
    }

    pub fn class(&self) -> Option<ErrorClass> {
        self.class
    }

    /// Message with the class token stripped
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The line as the server sent it
    pub fn line(&self) -> String {
        match self.class {
            Some(class) => format!("{} {}", class.as_str(), self.message),
            None => self.message.clone(),
        }
    }
}
