//! Command definitions
//!
//! A command is a name plus scalar arguments. Meaning is left to callers.

use bytes::Bytes;

/// A single scalar command argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Sent as-is
    Bytes(Bytes),

    /// Encoded with the connection's text encoding
    Text(String),

    Int(i64),

    UInt(u64),

    Float(f64),
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Text(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Text(value)
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Text(value.clone())
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(value))
    }
}

impl<const N: usize> From<&[u8; N]> for Arg {
    fn from(value: &[u8; N]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Arg::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Self {
        Arg::Bytes(value)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<f32> for Arg {
    fn from(value: f32) -> Self {
        Arg::Float(f64::from(value))
    }
}

macro_rules! signed_arg {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Arg {
            fn from(value: $ty) -> Self {
                Arg::Int(i64::from(value))
            }
        })*
    };
}

macro_rules! unsigned_arg {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Arg {
            fn from(value: $ty) -> Self {
                Arg::UInt(u64::from(value))
            }
        })*
    };
}

signed_arg!(i8, i16, i32, i64);
unsigned_arg!(u8, u16, u32, u64);

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Arg::UInt(value as u64)
    }
}

impl From<isize> for Arg {
    fn from(value: isize) -> Self {
        Arg::Int(value as i64)
    }
}

/// A command ready for encoding
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    args: Vec<Arg>,
}

impl Command {
    /// Start a command with no arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Build a command from whitespace-separated words, e.g. `"GET foo"`
    ///
    /// Returns `None` for a blank line.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let name = words.next()?;
        Some(Self::new(name).args(words))
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Arg] {
        &self.args
    }
}
