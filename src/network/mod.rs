//! Network Module
//!
//! Transport lifecycle and receive-path glue.
//!
//! ## Architecture
//! - Issuers on any thread write under the link lock
//! - One receive thread per link owns the decoder
//! - Replies are routed to the pipeline or to the `ReplyHandler`

mod connection;
mod handler;
mod router;

pub use connection::{Connection, ConnectionState};
pub use handler::{ConnectionEvents, LogUnsolicited, NoEvents, ReplyHandler};
pub use router::ReplyRouter;
