//! Connection
//!
//! Owns the transport for one server link and glues the encoder, decoder and
//! pipeline together.
//!
//! ## Lifecycle
//! ```text
//! Disconnected ──connect()──► Connecting ──► Ready ──┬──► Disconnected
//!       ▲                                            └──► TimedOut
//!       └────────────── connect() again ─────────────────────┘
//! ```

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{CloseCause, RedwireError, Result};
use crate::pipeline::{PendingReply, RequestPipeline};
use crate::protocol::{Arg, Command, CommandEncoder, Reply};

use super::{ConnectionEvents, LogUnsolicited, NoEvents, ReplyHandler, ReplyRouter};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    TimedOut,
}

/// Write half of a live link
struct Link {
    stream: TcpStream,

    /// Distinguishes this link from earlier ones on the same Connection
    epoch: u64,

    /// Requests written on this link only; shared with its receive thread
    pipeline: Arc<RequestPipeline>,
}

/// State guarded by the link lock
///
/// Holding this lock across enqueue + write is what makes enqueue order
/// equal wire order.
struct LinkState {
    state: ConnectionState,
    link: Option<Link>,
}

struct Shared {
    config: Config,
    encoder: CommandEncoder,
    inner: Mutex<LinkState>,
    epochs: AtomicU64,
    reply_handler: Arc<dyn ReplyHandler>,
    events: Arc<dyn ConnectionEvents>,
}

/// Closes the link when the last user handle goes away
///
/// The receive thread only holds `Shared`, so it cannot keep this alive.
struct CloseOnDrop {
    shared: Arc<Shared>,
}

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.shared.close(CloseCause::ClosedLocally);
    }
}

/// Pipelined client connection
///
/// Cheap to clone; clones share the link, so commands may be issued from
/// several threads and are paired with replies in the order they were written.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
    _guard: Arc<CloseOnDrop>,
}

impl Connection {
    /// Create a disconnected connection with default handlers
    pub fn new(config: Config) -> Self {
        Self::with_handlers(config, Arc::new(LogUnsolicited), Arc::new(NoEvents))
    }

    /// Create a disconnected connection with custom handlers
    pub fn with_handlers(
        config: Config,
        reply_handler: Arc<dyn ReplyHandler>,
        events: Arc<dyn ConnectionEvents>,
    ) -> Self {
        let encoder = CommandEncoder::new(config.encoding, config.encoding_errors);
        let shared = Arc::new(Shared {
            config,
            encoder,
            inner: Mutex::new(LinkState {
                state: ConnectionState::Disconnected,
                link: None,
            }),
            epochs: AtomicU64::new(0),
            reply_handler,
            events,
        });
        let guard = Arc::new(CloseOnDrop {
            shared: Arc::clone(&shared),
        });
        Self {
            shared,
            _guard: guard,
        }
    }

    /// Create and connect
    pub fn open(config: Config) -> Result<Self> {
        let conn = Self::new(config);
        conn.connect()?;
        Ok(conn)
    }

    /// Dial the configured address and start the receive thread
    ///
    /// A no-op when already `Ready`.
    pub fn connect(&self) -> Result<()> {
        self.shared.config.validate()?;
        {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                ConnectionState::Ready => return Ok(()),
                ConnectionState::Connecting => {
                    return Err(RedwireError::Network(
                        "connection attempt already in progress".to_string(),
                    ))
                }
                ConnectionState::Disconnected | ConnectionState::TimedOut => {
                    inner.state = ConnectionState::Connecting;
                }
            }
        }

        let (reader, writer) = match self.shared.dial() {
            Ok(halves) => halves,
            Err(e) => {
                tracing::debug!("Connect to {} failed: {}", self.shared.config.addr, e);
                self.shared.inner.lock().state = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        let epoch = self.shared.epochs.fetch_add(1, Ordering::SeqCst) + 1;
        let pipeline = Arc::new(RequestPipeline::new());
        {
            let mut inner = self.shared.inner.lock();
            inner.state = ConnectionState::Ready;
            inner.link = Some(Link {
                stream: writer,
                epoch,
                pipeline: Arc::clone(&pipeline),
            });
        }
        tracing::debug!("Connected to {} (link {})", self.shared.config.addr, epoch);
        self.shared.events.on_ready();

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("redwire-recv-{}", epoch))
            .spawn(move || receive_loop(shared, reader, epoch, pipeline));
        if let Err(e) = spawned {
            self.shared.teardown(epoch, CloseCause::Transport(e.to_string()));
            return Err(RedwireError::Io(e));
        }
        Ok(())
    }

    /// Encode and send a command; the handle resolves with its reply
    pub fn issue_command(&self, name: &str, args: &[Arg]) -> Result<PendingReply> {
        let frame = self.shared.encoder.encode(name, args)?;
        self.shared.transmit(&frame, |pipeline| pipeline.enqueue())
    }

    pub fn issue(&self, command: &Command) -> Result<PendingReply> {
        self.issue_command(command.name(), command.arguments())
    }

    /// Send a command whose outcome is delivered to `callback` on the
    /// receive thread
    ///
    /// On a write failure the callback still fires, with the connection error.
    pub fn issue_with<F>(&self, command: &Command, callback: F) -> Result<()>
    where
        F: FnOnce(Result<Reply>) + Send + 'static,
    {
        let frame = self.shared.encoder.encode_command(command)?;
        self.shared
            .transmit(&frame, move |pipeline| pipeline.enqueue_callback(callback))
    }

    /// Issue a command and block for its reply
    pub fn call(&self, name: &str, args: &[Arg]) -> Result<Reply> {
        self.issue_command(name, args)?.wait()
    }

    /// Write a command without reserving a reply slot
    ///
    /// For commands answered only through intercepted pushes (SUBSCRIBE and
    /// friends). Anything else sent this way desynchronizes the pipeline.
    pub fn send_unpaired(&self, command: &Command) -> Result<()> {
        let frame = self.shared.encoder.encode_command(command)?;
        self.shared.transmit(&frame, |_| ())
    }

    /// Close the link, failing every pending request
    pub fn close(&self) {
        self.shared.close(CloseCause::ClosedLocally);
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Number of requests awaiting a reply on the current link
    pub fn pending(&self) -> usize {
        self.shared
            .inner
            .lock()
            .link
            .as_ref()
            .map_or(0, |link| link.pipeline.len())
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}

impl Shared {
    /// Open the socket and split it into (read, write) halves
    fn dial(&self) -> Result<(TcpStream, TcpStream)> {
        let stream = self.connect_any()?;

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        stream.set_write_timeout(self.config.write_timeout())?;
        // The read timeout is the idle timer: any inbound byte resets it
        stream.set_read_timeout(self.config.idle_timeout())?;

        let reader = stream.try_clone()?;
        Ok((reader, stream))
    }

    fn connect_any(&self) -> Result<TcpStream> {
        let mut last_err = None;
        for addr in self.config.addr.to_socket_addrs()? {
            let attempt = match self.config.connect_timeout() {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => RedwireError::Io(e),
            None => RedwireError::Network(format!(
                "address {} did not resolve",
                self.config.addr
            )),
        })
    }

    /// Register a pending slot and write `frame`, atomically with respect to
    /// other issuers and to teardown
    fn transmit<T>(&self, frame: &[u8], register: impl FnOnce(&RequestPipeline) -> T) -> Result<T> {
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Ready {
            return Err(RedwireError::NotConnected);
        }
        let link = match inner.link.as_mut() {
            Some(link) => link,
            None => return Err(RedwireError::NotConnected),
        };

        let registered = register(link.pipeline.as_ref());
        if let Err(e) = link.stream.write_all(frame) {
            let epoch = link.epoch;
            drop(inner);
            tracing::warn!("Write to {} failed: {}", self.config.addr, e);
            self.teardown(epoch, CloseCause::Transport(e.to_string()));
            return Err(RedwireError::Io(e));
        }
        tracing::trace!("Sent {} bytes to {}", frame.len(), self.config.addr);
        Ok(registered)
    }

    fn close(&self, cause: CloseCause) {
        let epoch = self.inner.lock().link.as_ref().map(|link| link.epoch);
        if let Some(epoch) = epoch {
            self.teardown(epoch, cause);
        }
    }

    /// Tear down link `epoch` exactly once
    ///
    /// State flips first so no new request can be enqueued, then every pending
    /// request of that link is failed, then the socket is shut down. Replies
    /// still in flight on the old receive thread stay with the old pipeline.
    fn teardown(&self, epoch: u64, cause: CloseCause) {
        let link = {
            let mut inner = self.inner.lock();
            match &inner.link {
                Some(link) if link.epoch == epoch => {}
                _ => return,
            }
            inner.state = match cause {
                CloseCause::IdleTimeout => ConnectionState::TimedOut,
                _ => ConnectionState::Disconnected,
            };
            inner.link.take()
        };

        let failed = match link {
            Some(link) => {
                let failed = link.pipeline.fail_all(&cause);
                let _ = link.stream.shutdown(Shutdown::Both);
                failed
            }
            None => 0,
        };
        tracing::debug!(
            "Link {} to {} closed ({}), failed {} pending requests",
            epoch,
            self.config.addr,
            cause,
            failed
        );
        self.events.on_closed(&cause);
    }
}

/// Receive thread body: read, route, and tear down on EOF, error or idle
fn receive_loop(
    shared: Arc<Shared>,
    mut stream: TcpStream,
    epoch: u64,
    pipeline: Arc<RequestPipeline>,
) {
    let mut router = ReplyRouter::new(shared.config.decoder_limits());
    let mut buf = vec![0u8; shared.config.read_buffer_size];

    let cause = loop {
        match stream.read(&mut buf) {
            Ok(0) => break CloseCause::ClosedByPeer,
            Ok(n) => {
                router.route(&buf[..n], &pipeline, shared.reply_handler.as_ref());
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            // Read timeout (Windows reports TimedOut instead of WouldBlock)
            Err(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                break CloseCause::IdleTimeout
            }
            Err(e) => break CloseCause::Transport(e.to_string()),
        }
    };

    if router.buffered() > 0 {
        tracing::debug!("Discarding {} bytes of partial reply", router.buffered());
    }
    shared.teardown(epoch, cause);
}
