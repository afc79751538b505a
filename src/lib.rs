//! # FINS/UDP client
//!
//! An event-driven Rust client for the Omron FINS protocol over UDP,
//! covering PLC memory access (read, write, fill) and basic controller
//! control (run, stop, status).
//!
//! The client is built for gateway-style polling: operations are
//! non-blocking sends, and every outcome — decoded values, controller
//! errors, timeouts — arrives on an event stream. Responses are matched to
//! requests by the FINS session id, so replies may arrive out of order
//! without being misattributed.
//!
//! ## Quick start
//!
//! ```no_run
//! use fins_udp::{Client, ClientConfig, ClientEvent, ReplyBody};
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! # async fn example() -> fins_udp::Result<()> {
//! let config = ClientConfig::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 250)));
//! let (client, mut events) = Client::connect(config).await?;
//!
//! // Read 4 words starting at DM 100
//! client.read("D100", 4)?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Reply(reply) => {
//!             if let ReplyBody::Values(values) = reply.body {
//!                 println!("D100..D103 = {values:?}");
//!             }
//!         }
//!         ClientEvent::Timeout { peer } => eprintln!("no answer from {peer}"),
//!         ClientEvent::Error(err) => eprintln!("{err}"),
//!         ClientEvent::Open { .. } => {}
//!         ClientEvent::Closed => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Addressing
//!
//! Memory addresses are strings in the form `AREA<number>[.<bit>]`, matched
//! case-insensitively: `D100` reads Data Memory words, `CIO10.5` reads a
//! single bit, `C5` reads a counter. Areas without true bit access (such as
//! DM) still accept a bit suffix — the word is read and the bit masked out
//! during decoding. An unrecognized area prefix falls back to Data Memory
//! rather than failing; [`translate`] exposes the fallback as
//! [`Translation::Defaulted`] for callers that need to detect it.
//!
//! ## Errors and timeouts
//!
//! Malformed addresses fail the call synchronously. Everything that happens
//! after the datagram leaves — controller end codes, malformed responses,
//! socket errors — is reported as [`ClientEvent::Error`]. A request with no
//! answer inside the timeout window raises [`ClientEvent::Timeout`], a
//! distinct event so "no answer" is never confused with "answer carrying a
//! failure code". The window is shared per client, not per request; see the
//! [`client`](crate::Client) module docs for the overlap caveat.
//!
//! The client never retries; reissuing timed-out requests is the caller's
//! call.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod client;
mod command;
mod error;
mod header;
mod memory;
mod response;
mod transport;

// Public re-exports
pub use client::{Client, ClientConfig, ClientEvent, Events};
pub use command::{CommandCode, FrameBuilder};
pub use error::{end_code_description, FinsError, Result};
pub use header::{FinsHeader, DEFAULT_SOURCE_NODE, FINS_HEADER_SIZE, SID_OFFSET};
pub use memory::{translate, MemoryLocation, Translation};
pub use response::{
    ControllerStatus, CpuMode, CpuStatus, FatalError, NonFatalError, PendingRead, Reply, ReplyBody,
    ResponseHead, MIN_RESPONSE_SIZE,
};
pub use transport::{UdpTransport, DEFAULT_FINS_PORT, DEFAULT_TIMEOUT, MAX_PACKET_SIZE};
