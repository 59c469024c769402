//! Connection hooks
//!
//! Strategy objects injected into a [`Connection`](super::Connection) in place
//! of subclassing it.

use crate::error::CloseCause;
use crate::protocol::{Decoded, Reply};

/// Receive-path strategy for decoded replies
///
/// Both methods run on the receive thread and must not block.
pub trait ReplyHandler: Send + Sync {
    /// Offered every successfully decoded top-level reply before request
    /// matching. Return `None` to consume it.
    fn intercept(&self, reply: Reply) -> Option<Reply> {
        Some(reply)
    }

    /// A reply arrived while no request was pending
    fn unsolicited(&self, reply: Decoded) {
        match reply {
            Ok(reply) => tracing::warn!("Unsolicited {} reply dropped: {}", reply.kind(), reply),
            Err(e) => tracing::warn!("Unsolicited malformed reply dropped: {}", e),
        }
    }
}

/// Default handler: no interception, unsolicited replies are logged
#[derive(Debug, Default, Clone, Copy)]
pub struct LogUnsolicited;

impl ReplyHandler for LogUnsolicited {}

/// Lifecycle callbacks, e.g. for a reconnection policy
pub trait ConnectionEvents: Send + Sync {
    /// The link is up and commands may be issued
    fn on_ready(&self) {}

    /// The link went away; every pending request has already been failed
    fn on_closed(&self, _cause: &CloseCause) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl ConnectionEvents for NoEvents {}
