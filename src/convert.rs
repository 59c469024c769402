//! Reply conversion
//!
//! Post-processing applied to a fulfilled reply by code built on top of the
//! core. The decoder hands back wire-shaped values only; which Rust type a
//! command "should" return is decided here, by the caller.

use bytes::Bytes;

use crate::error::{RedwireError, Result};
use crate::protocol::Reply;

/// Conversion from a wire-shaped reply
pub trait FromReply: Sized {
    fn from_reply(reply: Reply) -> Result<Self>;
}

fn unexpected(expected: &str, reply: &Reply) -> RedwireError {
    RedwireError::UnexpectedReply(format!("expected {}, got {}", expected, reply.kind()))
}

impl FromReply for Reply {
    fn from_reply(reply: Reply) -> Result<Self> {
        Ok(reply)
    }
}

/// Status replies such as `+OK`
impl FromReply for () {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::SimpleString(_) => Ok(()),
            other => Err(unexpected("status", &other)),
        }
    }
}

impl FromReply for Bytes {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::BulkString(Some(data)) => Ok(data),
            Reply::SimpleString(text) => Ok(Bytes::from(text)),
            other => Err(unexpected("bulk string", &other)),
        }
    }
}

impl FromReply for String {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::SimpleString(text) => Ok(text),
            Reply::BulkString(Some(data)) => String::from_utf8(data.to_vec())
                .map_err(|e| RedwireError::UnexpectedReply(format!("invalid utf-8: {}", e))),
            other => Err(unexpected("string", &other)),
        }
    }
}

impl FromReply for i64 {
    fn from_reply(reply: Reply) -> Result<Self> {
        match &reply {
            Reply::Integer(n) => Ok(*n),
            Reply::BulkString(Some(data)) => std::str::from_utf8(data)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| unexpected("integer", &reply)),
            _ => Err(unexpected("integer", &reply)),
        }
    }
}

/// Integer replies used as flags (EXISTS, SISMEMBER, ...)
impl FromReply for bool {
    fn from_reply(reply: Reply) -> Result<Self> {
        i64::from_reply(reply).map(|n| n != 0)
    }
}

impl FromReply for f64 {
    fn from_reply(reply: Reply) -> Result<Self> {
        match parse_number(&reply) {
            Some(number) => Ok(number.as_f64()),
            None => Err(unexpected("number", &reply)),
        }
    }
}

/// Null bulk and null array map to `None`
impl<T: FromReply> FromReply for Option<T> {
    fn from_reply(reply: Reply) -> Result<Self> {
        if reply.is_null() {
            Ok(None)
        } else {
            T::from_reply(reply).map(Some)
        }
    }
}

impl<T: FromReply> FromReply for Vec<T> {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::Array(Some(items)) => items.into_iter().map(T::from_reply).collect(),
            Reply::Array(None) => Ok(Vec::new()),
            other => Err(unexpected("array", &other)),
        }
    }
}

/// Group a flat array into pairs, e.g. HGETALL or CONFIG GET output
pub fn into_pairs<A: FromReply, B: FromReply>(reply: Reply) -> Result<Vec<(A, B)>> {
    let items = match reply {
        Reply::Array(Some(items)) => items,
        Reply::Array(None) => return Ok(Vec::new()),
        other => return Err(unexpected("array", &other)),
    };
    if items.len() % 2 != 0 {
        return Err(RedwireError::UnexpectedReply(format!(
            "expected an even number of elements, got {}",
            items.len()
        )));
    }

    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(a), Some(b)) = (iter.next(), iter.next()) {
        pairs.push((A::from_reply(a)?, B::from_reply(b)?));
    }
    Ok(pairs)
}

/// Numeric reading of a reply
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(n) => *n as f64,
            Number::Float(f) => *f,
        }
    }
}

/// Opportunistic numeric coercion of an integer or bulk reply
///
/// A payload containing `.` reads as a float, anything else as an integer;
/// non-numeric payloads give `None`.
pub fn parse_number(reply: &Reply) -> Option<Number> {
    let text = match reply {
        Reply::Integer(n) => return Some(Number::Int(*n)),
        Reply::BulkString(Some(data)) => std::str::from_utf8(data).ok()?,
        Reply::SimpleString(text) => text.as_str(),
        _ => return None,
    };
    if text.contains('.') {
        text.parse().ok().map(Number::Float)
    } else {
        text.parse().ok().map(Number::Int)
    }
}
