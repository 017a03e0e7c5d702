//! The remote backend: same inputs, same lowering, across a wire.

use std::collections::BTreeSet;
use std::thread;
use std::time::Instant;

use forma_compile::{Artifact, CompileError, UnitCompiler};
use forma_ir::{RefId, TypeUnit};

use crate::client::HostClient;
use crate::endpoint::{HostEndpoint, HostOptions};
use crate::protocol::{Request, Response};
use crate::HostError;

/// Compiles by round-tripping unit batches to a compiler host.
///
/// A host that is not accepting yet is retried with bounded backoff up to
/// the startup timeout; after that the compile fails with
/// [`CompileError::HostUnavailable`]. There is no silent fallback to
/// in-process compilation.
pub struct RemoteCompiler {
    endpoint: HostEndpoint,
    options: HostOptions,
}

impl RemoteCompiler {
    pub fn new(endpoint: HostEndpoint) -> Self {
        Self::with_options(endpoint, HostOptions::default())
    }

    pub fn with_options(endpoint: HostEndpoint, options: HostOptions) -> Self {
        Self { endpoint, options }
    }

    #[must_use]
    pub fn endpoint(&self) -> &HostEndpoint {
        &self.endpoint
    }

    fn unavailable(&self, detail: impl Into<String>) -> CompileError {
        CompileError::HostUnavailable {
            endpoint: self.endpoint.addr(),
            detail: detail.into(),
        }
    }

    /// Connect with retry, then run exactly one turnaround. Only connect
    /// failures retry; anything past an established connection is final.
    fn roundtrip_with_retry(&self, request: &Request) -> Result<Response, HostError> {
        let deadline = Instant::now() + self.options.startup_timeout;
        loop {
            match HostClient::connect(
                &self.endpoint.addr(),
                self.options.poll_interval,
                self.options.io_timeout,
            ) {
                Ok(client) => return client.roundtrip(request),
                Err(err) if Instant::now() < deadline => {
                    tracing::trace!(error = %err, "compiler host not ready, retrying");
                    thread::sleep(self.options.poll_interval);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl UnitCompiler for RemoteCompiler {
    fn compile(
        &self,
        units: &[TypeUnit],
        references: &BTreeSet<RefId>,
    ) -> Result<Artifact, CompileError> {
        let request = Request::Compile {
            units: units.to_vec(),
            references: references.clone(),
        };
        let response = self
            .roundtrip_with_retry(&request)
            .map_err(|err| self.unavailable(err.to_string()))?;

        match response {
            Response::Compiled { artifact, warnings } => {
                if !warnings.is_empty() {
                    tracing::debug!(count = warnings.len(), "compiler host reported warnings");
                }
                Artifact::from_bytes(&artifact).map_err(CompileError::Artifact)
            }
            Response::Rejected { diagnostics } => Err(CompileError::Rejected(diagnostics)),
            Response::Pong { .. } | Response::ShuttingDown => {
                Err(self.unavailable("unexpected response to a compile request"))
            }
        }
    }
}
