//! # redwire
//!
//! Client core for the Redis serialization protocol (RESP2):
//! - Incremental, resumable reply decoding
//! - Binary-safe command encoding with configurable text encoding
//! - FIFO request pipelining over a single connection
//! - Idle timeout and connection lifecycle with fail-all on close
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Callers (any number of threads)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ issue()
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Connection                              │
//! │        (encode → enqueue + write under the link lock)        │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │ CommandEncoder  │                │ RequestPipeline │◄──┐
//!   │ (array of bulk) │                │     (FIFO)      │   │ complete()
//!   └────────┬────────┘                └─────────────────┘   │
//!            │                                               │
//!            ▼                                               │
//!      ┌──────────┐   bytes   ┌──────────────┐   replies   ┌─┴────────────┐
//!      │  Socket  ├──────────►│ ReplyDecoder ├────────────►│ ReplyRouter  │
//!      └──────────┘           └──────────────┘             │ (recv thread)│
//!                                                          └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod convert;
pub mod network;
pub mod pipeline;
pub mod protocol;
pub mod pubsub;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, ConfigBuilder};
pub use convert::FromReply;
pub use error::{CloseCause, RedwireError, Result};
pub use network::{Connection, ConnectionState};
pub use pipeline::PendingReply;
pub use protocol::{Arg, Command, Reply, ServerError};
pub use pubsub::{PubSubEvent, Subscriber};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of redwire
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
