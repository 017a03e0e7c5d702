//! The blocking compile server: thread per connection, one turnaround each.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use forma_compile::{CompileError, InProcessCompiler, UnitCompiler};
use forma_diagnostic::{DiagCode, Diagnostic};

use crate::protocol::{read_message, write_message, Request, Response};
use crate::{HostError, HOST_VERSION};

/// How long a connection may stall before its handler gives up on it.
const CONN_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// A bound compiler host. Serves until a client asks it to shut down.
pub struct HostServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    shared: Arc<Shared>,
}

struct Shared {
    compiler: InProcessCompiler,
    shutdown: AtomicBool,
    local_addr: SocketAddr,
}

impl HostServer {
    pub fn bind(addr: &str) -> Result<Self, HostError> {
        let listener = TcpListener::bind(addr).map_err(|source| HostError::Bind {
            endpoint: addr.to_owned(),
            source,
        })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            shared: Arc::new(Shared {
                compiler: InProcessCompiler::new(),
                shutdown: AtomicBool::new(false),
                local_addr,
            }),
        })
    }

    /// The bound address; useful after binding port 0.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until shutdown. Each connection gets its own
    /// thread and serves exactly one request/response turnaround.
    pub fn serve(self) -> Result<(), HostError> {
        tracing::info!(addr = %self.local_addr, version = HOST_VERSION, "compiler host listening");
        for conn in self.listener.incoming() {
            if self.shared.shutdown.load(Ordering::SeqCst) {
                break;
            }
            match conn {
                Ok(stream) => {
                    let shared = Arc::clone(&self.shared);
                    thread::spawn(move || {
                        if let Err(err) = handle_connection(stream, &shared) {
                            tracing::warn!(error = %err, "connection handler failed");
                        }
                    });
                }
                Err(err) => tracing::warn!(error = %err, "accept failed"),
            }
        }
        tracing::info!(addr = %self.local_addr, "compiler host stopped");
        Ok(())
    }
}

fn handle_connection(mut stream: TcpStream, shared: &Shared) -> Result<(), HostError> {
    stream.set_read_timeout(Some(CONN_IO_TIMEOUT))?;
    stream.set_write_timeout(Some(CONN_IO_TIMEOUT))?;

    let request: Request = read_message(&mut stream)?;
    match request {
        Request::Ping => write_message(
            &mut stream,
            &Response::Pong {
                version: HOST_VERSION.to_owned(),
            },
        ),
        Request::Compile { units, references } => {
            tracing::debug!(
                units = units.len(),
                references = references.len(),
                "compile request"
            );
            let response = match shared.compiler.compile(&units, &references) {
                Ok(artifact) => {
                    let warnings = artifact.warnings.clone();
                    let bytes = artifact
                        .to_bytes()
                        .map_err(|e| HostError::Frame(e.to_string()))?;
                    Response::Compiled {
                        artifact: bytes,
                        warnings,
                    }
                }
                Err(CompileError::Rejected(diagnostics)) => Response::Rejected { diagnostics },
                Err(err) => {
                    // The in-process backend only rejects with diagnostics;
                    // anything else is an internal failure worth reporting
                    // to the client rather than dropping the connection.
                    tracing::error!(error = %err, "unexpected backend failure");
                    Response::Rejected {
                        diagnostics: vec![Diagnostic::error(DiagCode::E9001)
                            .with_message(format!("internal backend failure: {err}"))],
                    }
                }
            };
            write_message(&mut stream, &response)
        }
        Request::Shutdown => {
            tracing::info!("shutdown requested");
            shared.shutdown.store(true, Ordering::SeqCst);
            let result = write_message(&mut stream, &Response::ShuttingDown);
            // The accept loop blocks in `accept`; nudge it so it observes
            // the flag. The nudge connection itself is never served.
            let _ = TcpStream::connect(shared.local_addr);
            result
        }
    }
}
