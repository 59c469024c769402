//! Request pipeline
//!
//! FIFO of in-flight requests. Replies arrive in the order commands were
//! written, so pairing is nothing more than "pop the oldest".

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::pending::{Completion, PendingReply};
use crate::error::{CloseCause, RedwireError, Result};
use crate::protocol::{Decoded, Reply};

/// Ordered queue of pending requests for one connection
///
/// ## Invariant
/// `len()` == commands enqueued - top-level replies completed - failed slots.
/// The queue is never inspected or reordered.
#[derive(Debug, Default)]
pub struct RequestPipeline {
    queue: Mutex<VecDeque<Completion>>,
}

impl RequestPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot and return its handle
    ///
    /// Must run before the command's bytes reach the transport.
    pub fn enqueue(&self) -> PendingReply {
        let (completion, pending) = PendingReply::channel();
        self.queue.lock().push_back(completion);
        pending
    }

    /// Append a slot fulfilled through `callback` on the receive thread
    pub fn enqueue_callback<F>(&self, callback: F)
    where
        F: FnOnce(Result<Reply>) + Send + 'static,
    {
        self.queue
            .lock()
            .push_back(Completion::Callback(Box::new(callback)));
    }

    /// Fulfil the oldest slot with a decoded top-level reply
    ///
    /// Hands the reply back when nothing is pending, so the caller can route
    /// it as unsolicited.
    pub fn complete(&self, decoded: Decoded) -> std::result::Result<(), Decoded> {
        let oldest = self.queue.lock().pop_front();
        match oldest {
            Some(completion) => {
                completion.fulfill(into_outcome(decoded));
                Ok(())
            }
            None => Err(decoded),
        }
    }

    /// Fail every pending slot, oldest first, and empty the queue
    ///
    /// Returns the number of requests failed.
    pub fn fail_all(&self, cause: &CloseCause) -> usize {
        let drained: Vec<Completion> = self.queue.lock().drain(..).collect();
        let count = drained.len();
        for completion in drained {
            completion.fulfill(Err(cause.to_error()));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

/// Per-request outcome: server and protocol errors fail only their own slot
fn into_outcome(decoded: Decoded) -> Result<Reply> {
    match decoded {
        Ok(Reply::Error(err)) => Err(RedwireError::Server(err)),
        Ok(reply) => Ok(reply),
        Err(err) => Err(RedwireError::Protocol(err)),
    }
}
