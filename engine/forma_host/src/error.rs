//! Host failures: transport, lifecycle, and protocol problems.
//!
//! A different animal from compile diagnostics: a rejected unit is an
//! answer, an unreachable host is the absence of one.

use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("could not bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("could not connect to compiler host at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o failure talking to the compiler host")]
    Io(#[from] io::Error),

    #[error("malformed frame: {0}")]
    Frame(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(&'static str),

    #[error("failed to spawn compiler host binary `{path}`: {source}")]
    Spawn {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("compiler host did not become ready within {timeout:?}")]
    StartupTimeout { timeout: Duration },

    #[error("compiler host runs version {host}, this client is {client}")]
    VersionMismatch { host: String, client: String },
}
