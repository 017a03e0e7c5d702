//! Runtime type synthesis: templates in, instances out.
//!
//! A [`TypeLibrary`] turns a [`TypeKey`] plus an ordered pipeline of
//! [`Template`] steps into a compiled, cached, instantiable type:
//!
//! ```text
//! let library = TypeLibrary::in_process();
//! let key = TypeKey::new("app.Counter");
//!
//! // Synthesize + compile at most once per key, even under concurrency.
//! library.ensure_written(&key, |pipeline| {
//!     pipeline.push(AddCountField);
//!     pipeline.push(AddBumpMethod);
//! })?;
//!
//! // Instantiate by constructor ordinal thereafter (0 = all defaults).
//! let mut counter = library.create_instance(&key, 0, &[])?;
//! counter.call("bump", &[Value::Int(5)])?;
//! ```
//!
//! Templates run in insertion order against one [`EmitContext`]; the
//! emitted unit goes to whichever [`UnitCompiler`] backend the library was
//! built with: in-process lowering, or a remote compiler host process via
//! [`RemoteCompiler`]. Either way the compiled artifact loads into the
//! library's private module and the handle lands in the key-indexed cache.

mod config;
mod context;
mod error;
mod key;
mod library;
mod template;

pub use config::{CancelToken, LibraryConfig};
pub use context::EmitContext;
pub use error::{FactoryError, SynthError};
pub use key::TypeKey;
pub use library::{TypeLibrary, Written};
pub use template::{Pipeline, PipelineBuilder, Template, TemplateError};

// The types the library surface traffics in, re-exported so everyday
// callers depend on this crate alone.
pub use forma_compile::{
    BuiltinRegistry, CompileError, InProcessCompiler, Instance, LoadError, RunError, ScalarType,
    TypeHandle, UnitCompiler, Value,
};
pub use forma_diagnostic::Diagnostic;
pub use forma_host::{HostEndpoint, HostOptions, RemoteCompiler};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing output for debugging.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=forma_runtime=debug` or `RUST_LOG=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
