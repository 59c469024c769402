//! Pending reply handles
//!
//! One single-assignment result cell per in-flight command.

use std::fmt;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::convert::FromReply;
use crate::error::{CloseCause, RedwireError, Result};
use crate::protocol::Reply;

/// Callback fired with a request's outcome
pub type ReplyCallback = Box<dyn FnOnce(Result<Reply>) + Send + 'static>;

/// The write side of a pending request's result cell
pub(crate) enum Completion {
    Channel(Sender<Result<Reply>>),
    Callback(ReplyCallback),
}

impl Completion {
    /// Consumes the cell, so it can only ever be fulfilled once
    pub(crate) fn fulfill(self, outcome: Result<Reply>) {
        match self {
            Completion::Channel(tx) => {
                // Receiver gone means the caller stopped caring
                let _ = tx.send(outcome);
            }
            Completion::Callback(callback) => callback(outcome),
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Channel(_) => f.write_str("Completion::Channel"),
            Completion::Callback(_) => f.write_str("Completion::Callback"),
        }
    }
}

/// Handle to the eventual reply of one command
///
/// Waiting is the only blocking point the core exposes.
#[derive(Debug)]
pub struct PendingReply {
    rx: Receiver<Result<Reply>>,
}

impl PendingReply {
    pub(crate) fn channel() -> (Completion, Self) {
        let (tx, rx) = bounded(1);
        (Completion::Channel(tx), Self { rx })
    }

    /// Block until the reply arrives or the connection fails
    pub fn wait(self) -> Result<Reply> {
        self.rx.recv().unwrap_or_else(|_| Err(abandoned()))
    }

    /// Block for at most `timeout`; `None` if nothing arrived yet
    ///
    /// This does not cancel the request: its reply still consumes its slot.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<Reply>> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(abandoned())),
        }
    }

    /// Take the outcome if it is already available
    pub fn try_take(&self) -> Option<Result<Reply>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(abandoned())),
        }
    }

    /// Wait and convert the reply
    pub fn wait_as<T: FromReply>(self) -> Result<T> {
        T::from_reply(self.wait()?)
    }
}

/// The cell was dropped unfulfilled, which only happens when the whole
/// pipeline is torn down
fn abandoned() -> RedwireError {
    RedwireError::ConnectionClosed(CloseCause::ClosedLocally)
}
