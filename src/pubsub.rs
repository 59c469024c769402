//! Pub/sub
//!
//! A thin router on top of the reply stream. Push messages are intercepted
//! before request matching and turned into [`PubSubEvent`]s.
//!
//! ## Push Shapes
//! ```text
//! ["message",      channel, payload]
//! ["pmessage",     pattern, channel, payload]
//! ["subscribe",    channel, count]     (likewise unsubscribe,
//!                                        psubscribe, punsubscribe)
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::config::Config;
use crate::error::{RedwireError, Result};
use crate::network::{Connection, ConnectionEvents, NoEvents, ReplyHandler};
use crate::protocol::{Command, Reply};

/// A decoded push message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubSubEvent {
    Message {
        channel: Bytes,
        payload: Bytes,
    },
    PatternMessage {
        pattern: Bytes,
        channel: Bytes,
        payload: Bytes,
    },
    Subscribed {
        channel: Bytes,
        count: i64,
    },
    Unsubscribed {
        channel: Bytes,
        count: i64,
    },
    PatternSubscribed {
        pattern: Bytes,
        count: i64,
    },
    PatternUnsubscribed {
        pattern: Bytes,
        count: i64,
    },
}

impl PubSubEvent {
    /// Recognise a push message; `None` for any other reply shape
    pub fn from_reply(reply: &Reply) -> Option<Self> {
        let items = reply.as_array()?;
        let (kind, rest) = items.split_first()?;

        match (kind.as_bytes()?, rest) {
            (b"message", [channel, payload]) => Some(PubSubEvent::Message {
                channel: bulk(channel)?,
                payload: bulk(payload)?,
            }),
            (b"pmessage", [pattern, channel, payload]) => Some(PubSubEvent::PatternMessage {
                pattern: bulk(pattern)?,
                channel: bulk(channel)?,
                payload: bulk(payload)?,
            }),
            (b"subscribe", [channel, count]) => Some(PubSubEvent::Subscribed {
                channel: bulk(channel)?,
                count: count.as_integer()?,
            }),
            (b"unsubscribe", [channel, count]) => Some(PubSubEvent::Unsubscribed {
                channel: bulk_or_empty(channel)?,
                count: count.as_integer()?,
            }),
            (b"psubscribe", [pattern, count]) => Some(PubSubEvent::PatternSubscribed {
                pattern: bulk(pattern)?,
                count: count.as_integer()?,
            }),
            (b"punsubscribe", [pattern, count]) => Some(PubSubEvent::PatternUnsubscribed {
                pattern: bulk_or_empty(pattern)?,
                count: count.as_integer()?,
            }),
            _ => None,
        }
    }

    /// Channel the event refers to (the pattern for pattern subscriptions)
    pub fn channel(&self) -> &Bytes {
        match self {
            PubSubEvent::Message { channel, .. }
            | PubSubEvent::PatternMessage { channel, .. }
            | PubSubEvent::Subscribed { channel, .. }
            | PubSubEvent::Unsubscribed { channel, .. } => channel,
            PubSubEvent::PatternSubscribed { pattern, .. }
            | PubSubEvent::PatternUnsubscribed { pattern, .. } => pattern,
        }
    }
}

fn bulk(reply: &Reply) -> Option<Bytes> {
    match reply {
        Reply::BulkString(Some(data)) => Some(data.clone()),
        _ => None,
    }
}

/// Unsubscribing from nothing reports a null channel
fn bulk_or_empty(reply: &Reply) -> Option<Bytes> {
    match reply {
        Reply::BulkString(None) => Some(Bytes::new()),
        other => bulk(other),
    }
}

/// Receiver of push events, called on the receive thread
pub trait PubSubListener: Send + Sync {
    fn on_event(&self, event: PubSubEvent);
}

/// Forwards events into a channel
impl PubSubListener for Sender<PubSubEvent> {
    fn on_event(&self, event: PubSubEvent) {
        if self.send(event).is_err() {
            tracing::debug!("Pub/sub event dropped: receiver gone");
        }
    }
}

/// Reply handler that diverts push messages to a listener
pub struct PubSubHandler<L> {
    listener: L,
}

impl<L: PubSubListener> PubSubHandler<L> {
    pub fn new(listener: L) -> Self {
        Self { listener }
    }
}

impl<L: PubSubListener> ReplyHandler for PubSubHandler<L> {
    fn intercept(&self, reply: Reply) -> Option<Reply> {
        match PubSubEvent::from_reply(&reply) {
            Some(event) => {
                tracing::trace!("Pub/sub event: {:?}", event);
                self.listener.on_event(event);
                None
            }
            None => Some(reply),
        }
    }
}

/// A connection dedicated to receiving published messages
///
/// Only subscription commands are sent on it; their confirmations arrive as
/// events, not as replies.
pub struct Subscriber {
    conn: Connection,
    events: Receiver<PubSubEvent>,
}

impl Subscriber {
    /// Connect with the idle timeout disabled
    pub fn connect(config: Config) -> Result<Self> {
        Self::connect_with_events(config, Arc::new(NoEvents))
    }

    pub fn connect_with_events(mut config: Config, events: Arc<dyn ConnectionEvents>) -> Result<Self> {
        // A quiet channel is not a dead connection
        config.idle_timeout_ms = 0;

        let (tx, rx) = unbounded();
        let conn = Connection::with_handlers(config, Arc::new(PubSubHandler::new(tx)), events);
        conn.connect()?;
        Ok(Self { conn, events: rx })
    }

    pub fn subscribe(&self, channels: &[&str]) -> Result<()> {
        self.send("SUBSCRIBE", channels, false)
    }

    /// Unsubscribe from `channels`, or from all channels when empty
    pub fn unsubscribe(&self, channels: &[&str]) -> Result<()> {
        self.send("UNSUBSCRIBE", channels, true)
    }

    pub fn psubscribe(&self, patterns: &[&str]) -> Result<()> {
        self.send("PSUBSCRIBE", patterns, false)
    }

    /// Unsubscribe from `patterns`, or from all patterns when empty
    pub fn punsubscribe(&self, patterns: &[&str]) -> Result<()> {
        self.send("PUNSUBSCRIBE", patterns, true)
    }

    fn send(&self, name: &str, targets: &[&str], allow_empty: bool) -> Result<()> {
        if targets.is_empty() && !allow_empty {
            return Err(RedwireError::InvalidData(format!(
                "{} needs at least one channel",
                name
            )));
        }
        let command = Command::new(name).args(targets.iter().copied());
        self.conn.send_unpaired(&command)
    }

    /// Wait up to `timeout` for the next event
    ///
    /// `Ok(None)` on timeout; `Err(NotConnected)` once the link is gone and
    /// every buffered event has been taken.
    pub fn next_event(&self, timeout: Duration) -> Result<Option<PubSubEvent>> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) if self.conn.is_ready() => Ok(None),
            Err(_) => Err(RedwireError::NotConnected),
        }
    }

    /// Raw event channel, e.g. for `select!`
    pub fn events(&self) -> &Receiver<PubSubEvent> {
        &self.events
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn close(&self) {
        self.conn.close();
    }
}
