//! Out-of-process compilation for Forma.
//!
//! A compiler host is a long-lived process that accepts unit batches over
//! TCP, lowers them with the in-process compiler, and replies with the
//! serialized artifact. This crate provides both halves:
//!
//! - [`HostServer`] and the `forma-host` binary, the serving side;
//! - [`RemoteCompiler`], a [`forma_compile::UnitCompiler`] that forwards
//!   batches to a host, plus [`HostEndpoint`] for locating, probing, and
//!   spawning one.
//!
//! The wire format is small: one length-prefixed bincode frame per
//! message, one request/response pair per connection. See [`protocol`]
//! for the exact message set.

pub mod client;
pub mod endpoint;
mod error;
pub mod protocol;
mod remote;
mod server;

pub use client::{ping, request_shutdown, HostClient};
pub use endpoint::{HostEndpoint, HostOptions, HostUp, BIN_ENV, DEFAULT_PORT};
pub use error::HostError;
pub use protocol::{read_message, write_message, Request, Response, MAX_FRAME_LEN};
pub use remote::RemoteCompiler;
pub use server::HostServer;

/// Version a host reports in its [`Response::Pong`] handshake.
///
/// Clients compare this against their own build; see
/// [`HostOptions::allow_version_skew`].
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");
