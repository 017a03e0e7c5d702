//! Library configuration and cooperative cancellation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use forma_compile::BuiltinRegistry;

/// Tuning for one [`TypeLibrary`](crate::TypeLibrary).
#[derive(Clone, Default)]
pub struct LibraryConfig {
    /// When set, every successful compile dumps a textual rendering of the
    /// emitted unit plus the raw artifact bytes into this directory. Debug
    /// aid only; dump failures are logged and never fail a synthesis.
    pub dump_dir: Option<PathBuf>,

    /// Builtin capabilities the loaded module resolves linked calls
    /// against. Defaults to the standard registry. Must agree with the
    /// registry the compile backend links against, or loading rejects the
    /// artifact with a missing capability.
    pub registry: Option<Arc<BuiltinRegistry>>,
}

impl LibraryConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<BuiltinRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }
}

/// Cooperative cancellation for a synthesis in flight.
///
/// Cheap to clone and share across threads. The orchestrator observes the
/// token at stage boundaries (before the pipeline runs, before compile,
/// before install); a cancelled synthesis installs nothing, and a later
/// call with the same key starts over.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
