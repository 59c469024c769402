//! Pipeline Module
//!
//! Strict-order pairing of issued commands with arriving replies.
//!
//! ## Flow
//! ```text
//!  issue ──► enqueue ──► write        (send side, under the link lock)
//!  read  ──► decode  ──► complete     (receive thread, oldest slot first)
//!  close ──► fail_all                 (every slot, oldest first)
//! ```

mod pending;
mod queue;

pub use pending::{PendingReply, ReplyCallback};
pub use queue::RequestPipeline;
