//! Event-driven FINS client.
//!
//! [`Client`] is a non-blocking façade over a driver task that owns the UDP
//! socket, the FINS header (including the SID counter), the session
//! registry of in-flight reads, and the response timeout. Operations
//! enqueue a request and return immediately; outcomes arrive on the
//! [`Events`] stream as [`ClientEvent`]s.
//!
//! Responses are correlated to requests by the echoed SID, not by send
//! order, so replies may be processed out of order without misattribution.
//!
//! # Timeout semantics
//!
//! There is **one** timeout window per client, armed on every send and
//! disarmed by any inbound datagram. Overlapping in-flight requests
//! therefore share it: a later request's response disarms the window an
//! earlier, still-outstanding request was counting on, and that earlier
//! request will never produce a [`ClientEvent::Timeout`]. This mirrors the
//! protocol's sequential poll-response usage; issue one request at a time
//! if per-request timeout reporting matters.
//!
//! # Example
//!
//! ```no_run
//! use fins_udp::{Client, ClientConfig, ClientEvent};
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! # async fn example() -> fins_udp::Result<()> {
//! let config = ClientConfig::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 250)));
//! let (client, mut events) = Client::connect(config).await?;
//!
//! client.read("D100", 4)?;
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Reply(reply) => println!("{:?}", reply.body),
//!         ClientEvent::Timeout { peer } => println!("no answer from {peer}"),
//!         ClientEvent::Error(err) => println!("{err}"),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::command::{encode_values, CommandCode, FrameBuilder};
use crate::error::{FinsError, Result};
use crate::header::{FinsHeader, DEFAULT_SOURCE_NODE};
use crate::memory::{translate, MemoryLocation, Translation};
use crate::response::{decode_read_body, decode_status, PendingRead, Reply, ReplyBody, ResponseHead};
use crate::transport::{UdpTransport, DEFAULT_FINS_PORT, DEFAULT_TIMEOUT, MAX_PACKET_SIZE};

/// Configuration for a FINS client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Controller IP address.
    pub host: IpAddr,
    /// Controller UDP port (default 9600).
    pub port: u16,
    /// Response timeout window (default 2 s); shared by all in-flight
    /// requests, see the module docs.
    pub timeout: Duration,
    /// Destination node address, DA1 (default 0x00).
    pub destination_node: u8,
    /// Source node address, SA1 (default 0x22).
    pub source_node: u8,
}

impl ClientConfig {
    /// Creates a configuration with protocol defaults for the given host.
    pub fn new(host: IpAddr) -> Self {
        Self {
            host,
            port: DEFAULT_FINS_PORT,
            timeout: DEFAULT_TIMEOUT,
            destination_node: 0x00,
            source_node: DEFAULT_SOURCE_NODE,
        }
    }

    /// Sets a custom controller port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets a custom response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the destination node address (DA1).
    pub fn with_destination_node(mut self, node: u8) -> Self {
        self.destination_node = node;
        self
    }

    /// Sets the source node address (SA1).
    pub fn with_source_node(mut self, node: u8) -> Self {
        self.source_node = node;
        self
    }

    fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Events emitted by a client.
#[derive(Debug)]
pub enum ClientEvent {
    /// Transport bound and connected.
    Open {
        /// Local socket address.
        local: SocketAddr,
        /// Controller address.
        peer: SocketAddr,
    },
    /// Transport torn down; the last event a client emits.
    Closed,
    /// Successful response (end code 0).
    Reply(Reply),
    /// Controller failure, malformed response, or socket error.
    Error(FinsError),
    /// No inbound datagram within the timeout window.
    Timeout {
        /// Controller address the window was armed for.
        peer: SocketAddr,
    },
}

/// Request operations accepted by the driver task.
#[derive(Debug)]
enum Op {
    Request(Request),
    Close,
}

#[derive(Debug)]
enum Request {
    Read {
        location: MemoryLocation,
        count: u16,
    },
    Write {
        location: MemoryLocation,
        values: Vec<u32>,
    },
    Fill {
        location: MemoryLocation,
        value: u32,
        count: u16,
    },
    Run,
    Stop,
    Status,
}

/// Stream of [`ClientEvent`]s from one client.
#[derive(Debug)]
pub struct Events {
    rx: mpsc::UnboundedReceiver<ClientEvent>,
}

impl Events {
    /// Receives the next event.
    ///
    /// Returns `None` once [`ClientEvent::Closed`] has been delivered and
    /// the driver is gone.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.rx.recv().await
    }
}

/// Non-blocking FINS client handle.
///
/// Cheap to clone; all clones feed the same driver task. Dropping every
/// clone closes the client as if [`Client::close`] had been called.
#[derive(Debug, Clone)]
pub struct Client {
    ops: mpsc::UnboundedSender<Op>,
}

impl Client {
    /// Binds a socket, connects it to the controller, and starts the driver
    /// task. Emits [`ClientEvent::Open`] once the transport is up.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the socket cannot be bound or connected.
    pub async fn connect(config: ClientConfig) -> Result<(Client, Events)> {
        let transport = UdpTransport::connect(config.socket_addr()).await?;
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            header: FinsHeader::new(config.destination_node, config.source_node),
            timeout: config.timeout,
            pending: HashMap::new(),
            deadline: None,
            transport,
            ops: ops_rx,
            events: events_tx,
        };
        tokio::spawn(driver.run());

        Ok((Client { ops: ops_tx }, Events { rx: events_rx }))
    }

    /// Requests `count` locations starting at `address`.
    ///
    /// The decoded values arrive as [`ReplyBody::Values`], one element per
    /// location at the address's width (a masked bit address yields 0/1).
    ///
    /// # Errors
    ///
    /// Returns [`FinsError::AddressFormat`] for a malformed address, or
    /// [`FinsError::Closed`] if the client is closed. Nothing reaches the
    /// wire in either case.
    pub fn read(&self, address: &str, count: u16) -> Result<()> {
        let location = checked_location(address)?;
        self.submit(Request::Read { location, count })
    }

    /// Writes one value per location starting at `address`.
    ///
    /// Values are encoded at the address's width: bit addresses as 0/1
    /// bytes, words as big-endian u16, double words as big-endian u32.
    pub fn write(&self, address: &str, values: &[u32]) -> Result<()> {
        let location = checked_location(address)?;
        self.submit(Request::Write {
            location,
            values: values.to_vec(),
        })
    }

    /// Fills `count` locations starting at `address` with one value.
    pub fn fill(&self, address: &str, value: u32, count: u16) -> Result<()> {
        let location = checked_location(address)?;
        self.submit(Request::Fill {
            location,
            value,
            count,
        })
    }

    /// Switches the controller to run mode.
    pub fn run(&self) -> Result<()> {
        self.submit(Request::Run)
    }

    /// Stops the controller.
    pub fn stop(&self) -> Result<()> {
        self.submit(Request::Stop)
    }

    /// Requests controller status (CPU state, mode, error flags).
    pub fn status(&self) -> Result<()> {
        self.submit(Request::Status)
    }

    /// Tears down the transport.
    ///
    /// In-flight requests are discarded without further `Reply`, `Error`,
    /// or `Timeout` events; [`ClientEvent::Closed`] is the final event.
    pub fn close(&self) -> Result<()> {
        self.ops.send(Op::Close).map_err(|_| FinsError::Closed)
    }

    fn submit(&self, request: Request) -> Result<()> {
        self.ops
            .send(Op::Request(request))
            .map_err(|_| FinsError::Closed)
    }
}

/// Translates an address, logging (but allowing) the DM fallback.
fn checked_location(address: &str) -> Result<MemoryLocation> {
    let translation = translate(address)?;
    if let Translation::Defaulted { area, .. } = &translation {
        tracing::warn!(address, %area, "unrecognized memory area, defaulting to DM");
    }
    Ok(translation.location())
}

/// Owns the socket, header, session registry, and timeout window.
///
/// Everything here is mutated from this task only; there is no lock.
struct Driver {
    header: FinsHeader,
    timeout: Duration,
    pending: HashMap<u8, PendingRead>,
    deadline: Option<Instant>,
    transport: UdpTransport,
    ops: mpsc::UnboundedReceiver<Op>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

enum Wake {
    Op(Option<Op>),
    Datagram(Result<usize>),
    Deadline,
}

/// Pends forever while no deadline is armed.
async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl Driver {
    async fn run(mut self) {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        let peer = self.transport.peer_addr();
        if let Ok(local) = self.transport.local_addr() {
            self.emit(ClientEvent::Open { local, peer });
        }

        loop {
            let deadline = self.deadline;
            let wake = tokio::select! {
                op = self.ops.recv() => Wake::Op(op),
                received = self.transport.recv(&mut buf) => Wake::Datagram(received),
                _ = deadline_elapsed(deadline) => Wake::Deadline,
            };

            match wake {
                // Channel gone means every client handle was dropped.
                Wake::Op(None) | Wake::Op(Some(Op::Close)) => break,
                Wake::Op(Some(Op::Request(request))) => self.send_request(request).await,
                Wake::Datagram(Ok(n)) => {
                    self.deadline = None;
                    self.handle_datagram(&buf[..n]);
                }
                Wake::Datagram(Err(err)) => self.emit(ClientEvent::Error(err)),
                Wake::Deadline => {
                    self.deadline = None;
                    tracing::debug!(%peer, "response window elapsed");
                    self.emit(ClientEvent::Timeout { peer });
                }
            }
        }

        // Reject further operations before announcing the close.
        self.ops.close();
        tracing::debug!(%peer, "client closed");
        self.emit(ClientEvent::Closed);
    }

    async fn send_request(&mut self, request: Request) {
        let sid = self.header.bump_sid();
        let frame = match &request {
            Request::Read { location, count } => {
                // Park the decoding context before the send so the response
                // cannot outrun it.
                self.pending.insert(sid, PendingRead::from(location));
                FrameBuilder::new(&self.header)
                    .command(CommandCode::MemoryRead)
                    .location(location)
                    .word(*count)
                    .build()
            }
            Request::Write { location, values } => {
                let data = encode_values(values, location.bytes_per_location);
                FrameBuilder::new(&self.header)
                    .command(CommandCode::MemoryWrite)
                    .location(location)
                    .word(values.len() as u16)
                    .data(&data)
                    .build()
            }
            Request::Fill {
                location,
                value,
                count,
            } => {
                let data = encode_values(&[*value], location.bytes_per_location);
                FrameBuilder::new(&self.header)
                    .command(CommandCode::MemoryFill)
                    .location(location)
                    .word(*count)
                    .data(&data)
                    .build()
            }
            Request::Run => FrameBuilder::new(&self.header)
                .command(CommandCode::Run)
                .build(),
            Request::Stop => FrameBuilder::new(&self.header)
                .command(CommandCode::Stop)
                .build(),
            Request::Status => FrameBuilder::new(&self.header)
                .command(CommandCode::StatusRead)
                .build(),
        };

        self.deadline = Some(Instant::now() + self.timeout);
        if let Err(err) = self.transport.send(&frame).await {
            self.emit(ClientEvent::Error(err));
        }
    }

    fn handle_datagram(&mut self, buf: &[u8]) {
        let head = match ResponseHead::parse(buf) {
            Ok(head) => head,
            Err(err) => {
                self.emit(ClientEvent::Error(err));
                return;
            }
        };

        let body = match CommandCode::from_bytes(head.command) {
            Some(CommandCode::MemoryRead) => {
                // Consume the context even for a failed response; a SID with
                // no entry is a duplicate or expired response and is dropped.
                let Some(pending) = self.pending.remove(&head.sid) else {
                    tracing::warn!(sid = head.sid, "response for unknown session id, dropped");
                    return;
                };
                if head.end_code != 0 {
                    self.emit(ClientEvent::Error(FinsError::end_code(head.end_code)));
                    return;
                }
                decode_read_body(buf, &pending)
            }
            Some(CommandCode::StatusRead) if head.end_code == 0 => match decode_status(buf) {
                Ok(status) => ReplyBody::Status(status),
                Err(err) => {
                    self.emit(ClientEvent::Error(err));
                    return;
                }
            },
            _ => {
                if head.end_code != 0 {
                    self.emit(ClientEvent::Error(FinsError::end_code(head.end_code)));
                    return;
                }
                ReplyBody::Ack
            }
        };

        self.emit(ClientEvent::Reply(Reply {
            sid: head.sid,
            command: head.command,
            end_code: head.end_code,
            body,
        }));
    }

    fn emit(&self, event: ClientEvent) {
        // The receiver side may already be gone; events are best-effort.
        let _ = self.events.send(event);
    }
}
