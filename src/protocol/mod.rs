//! Protocol Module
//!
//! Wire format for client-server communication.
//!
//! ## Request Format
//! Every command is an array of bulk strings:
//! ```text
//! *<argc>\r\n$<len>\r\n<name>\r\n$<len>\r\n<arg1>\r\n ...
//! ```
//!
//! ## Reply Format
//! ```text
//! ┌──────┬───────────────┬──────────────────────────────────────────┐
//! │ Byte │ Reply         │ Framing                                  │
//! ├──────┼───────────────┼──────────────────────────────────────────┤
//! │  +   │ simple string │ rest of line                             │
//! │  -   │ error         │ rest of line, optional class token       │
//! │  :   │ integer       │ rest of line, signed decimal             │
//! │  $   │ bulk string   │ length line, payload, CRLF (-1 = null)   │
//! │  *   │ array         │ count line, count replies (-1 = null)    │
//! └──────┴───────────────┴──────────────────────────────────────────┘
//! ```

mod command;
mod decoder;
mod encoder;
mod reply;

pub use command::{Arg, Command};
pub use decoder::{
    Decoded, DecoderLimits, ProtocolError, Replies, ReplyDecoder, DEFAULT_MAX_ARRAY_LEN,
    DEFAULT_MAX_BULK_LEN, DEFAULT_MAX_LINE_LEN,
};
pub use encoder::{CommandEncoder, EncodingErrors, TextEncoding};
pub use reply::{ErrorClass, Reply, ServerError};
