//! Host process lifecycle: find a running host, start one, stop one.
//!
//! `ensure_up` and `ensure_down` are redundant-safe: any number of
//! libraries or processes may call them against the same endpoint, and a
//! host that is already in the requested state is left alone.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::{client, HostError, HOST_VERSION};

/// The well-known local port compile hosts default to.
pub const DEFAULT_PORT: u16 = 50555;

/// Environment override for the host binary path.
pub const BIN_ENV: &str = "FORMA_HOST_BIN";

/// Where a compiler host lives.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct HostEndpoint {
    host: String,
    port: u16,
}

impl HostEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn localhost(port: u16) -> Self {
        Self::new("127.0.0.1", port)
    }

    /// `127.0.0.1` on the well-known port.
    pub fn default_local() -> Self {
        Self::localhost(DEFAULT_PORT)
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The `host:port` form used for connects and binds.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True if something on the endpoint answers a protocol ping.
    #[must_use]
    pub fn is_up(&self, timeout: Duration) -> bool {
        client::ping(&self.addr(), timeout).is_ok()
    }

    /// Make sure a compiler host serves this endpoint: reuse a live one,
    /// otherwise spawn the host binary and poll until it answers or the
    /// startup timeout passes.
    pub fn ensure_up(&self, options: &HostOptions) -> Result<HostUp, HostError> {
        if let Ok(version) = client::ping(&self.addr(), options.io_timeout) {
            check_version(&version, options)?;
            tracing::debug!(endpoint = %self, version = %version, "reusing compiler host");
            return Ok(HostUp {
                reused: true,
                version,
            });
        }

        let path = resolve_binary(options);
        tracing::info!(endpoint = %self, binary = %path.display(), "starting compiler host");
        Command::new(&path)
            .arg("--addr")
            .arg(self.addr())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| HostError::Spawn {
                path: path.display().to_string(),
                source,
            })?;

        let deadline = Instant::now() + options.startup_timeout;
        loop {
            match client::ping(&self.addr(), options.poll_interval) {
                Ok(version) => {
                    check_version(&version, options)?;
                    tracing::info!(endpoint = %self, version = %version, "compiler host is up");
                    return Ok(HostUp {
                        reused: false,
                        version,
                    });
                }
                Err(_) if Instant::now() < deadline => thread::sleep(options.poll_interval),
                Err(_) => {
                    return Err(HostError::StartupTimeout {
                        timeout: options.startup_timeout,
                    })
                }
            }
        }
    }

    /// Best-effort shutdown. Ok when the host acknowledges, and Ok when
    /// nothing is listening there at all.
    pub fn ensure_down(&self, options: &HostOptions) -> Result<(), HostError> {
        match client::request_shutdown(&self.addr(), options.io_timeout) {
            Ok(()) => {
                tracing::debug!(endpoint = %self, "compiler host acknowledged shutdown");
                Ok(())
            }
            // Nothing there, or it died mid-farewell. Either way: down.
            Err(HostError::Connect { .. } | HostError::Io(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl Default for HostEndpoint {
    fn default() -> Self {
        Self::default_local()
    }
}

impl fmt::Display for HostEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Lifecycle and transport tuning for one endpoint.
#[derive(Clone, Debug)]
pub struct HostOptions {
    /// Explicit host binary path. When unset, `FORMA_HOST_BIN` decides,
    /// then a `forma-host` next to the current executable.
    pub binary: Option<PathBuf>,
    /// How long `ensure_up` keeps polling a freshly spawned host.
    pub startup_timeout: Duration,
    /// Pause between readiness probes; also each probe's connect budget.
    pub poll_interval: Duration,
    /// Read/write budget for one established turnaround.
    pub io_timeout: Duration,
    /// Log version skew instead of failing on it.
    pub allow_version_skew: bool,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            binary: None,
            startup_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            io_timeout: Duration::from_secs(10),
            allow_version_skew: false,
        }
    }
}

/// What `ensure_up` found or made.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostUp {
    /// True when a live host was already serving the endpoint.
    pub reused: bool,
    pub version: String,
}

fn check_version(host: &str, options: &HostOptions) -> Result<(), HostError> {
    if host == HOST_VERSION {
        return Ok(());
    }
    if options.allow_version_skew {
        tracing::warn!(host, client = HOST_VERSION, "compiler host version skew");
        return Ok(());
    }
    Err(HostError::VersionMismatch {
        host: host.to_owned(),
        client: HOST_VERSION.to_owned(),
    })
}

fn resolve_binary(options: &HostOptions) -> PathBuf {
    if let Some(path) = &options.binary {
        return path.clone();
    }
    if let Ok(path) = env::var(BIN_ENV) {
        return PathBuf::from(path);
    }
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("forma-host")))
        .unwrap_or_else(|| PathBuf::from("forma-host"))
}
