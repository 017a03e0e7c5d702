//! One-turnaround client for the compiler host.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::protocol::{read_message, write_message, Request, Response};
use crate::HostError;

/// A connected client good for exactly one request/response turnaround.
pub struct HostClient {
    stream: TcpStream,
}

impl HostClient {
    /// Connect with separate budgets for the handshake and for the
    /// turnaround i/o.
    pub fn connect(
        endpoint: &str,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<Self, HostError> {
        let connect_err = |source| HostError::Connect {
            endpoint: endpoint.to_owned(),
            source,
        };

        let addrs = endpoint.to_socket_addrs().map_err(connect_err)?;
        let mut last = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(io_timeout))?;
                    stream.set_write_timeout(Some(io_timeout))?;
                    return Ok(Self { stream });
                }
                Err(err) => last = Some(err),
            }
        }
        Err(connect_err(last.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "endpoint resolved to nothing")
        })))
    }

    /// Send one request and wait for its response. Consumes the client:
    /// the protocol is one turnaround per connection.
    pub fn roundtrip(mut self, request: &Request) -> Result<Response, HostError> {
        write_message(&mut self.stream, request)?;
        read_message(&mut self.stream)
    }
}

/// Probe a host: connect, ping, return its version.
pub fn ping(endpoint: &str, timeout: Duration) -> Result<String, HostError> {
    let client = HostClient::connect(endpoint, timeout, timeout)?;
    match client.roundtrip(&Request::Ping)? {
        Response::Pong { version } => Ok(version),
        _ => Err(HostError::UnexpectedResponse("expected pong")),
    }
}

/// Ask a host to stop. The caller decides what a refused connection means.
pub fn request_shutdown(endpoint: &str, timeout: Duration) -> Result<(), HostError> {
    let client = HostClient::connect(endpoint, timeout, timeout)?;
    match client.roundtrip(&Request::Shutdown)? {
        Response::ShuttingDown => Ok(()),
        _ => Err(HostError::UnexpectedResponse("expected shutdown acknowledgement")),
    }
}
