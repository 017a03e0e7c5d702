//! Compiler backends for unit definitions.
//!
//! The [`UnitCompiler`] trait is the seam between synthesis and compilation:
//! give it emitted [`TypeUnit`]s plus the set of external references they may
//! call, get back a loadable [`Artifact`] or a batch of diagnostics. The
//! in-process backend lowers on the calling thread; the remote backend (in
//! `forma_host`) sends the same inputs across a wire to a compiler host
//! running the identical lowering, so both produce equivalent compiled types.
//!
//! An [`Artifact`] round-trips through bytes, loads into a [`Module`], and
//! hands out [`TypeHandle`]s whose constructors and methods run on a small
//! slot-and-stack interpreter.
//!
//! [`TypeUnit`]: forma_ir::TypeUnit

mod artifact;
mod backend;
mod builtins;
mod in_process;
mod interp;
mod lower;
mod module;

#[cfg(test)]
mod tests;

pub use artifact::{
    Artifact, ArtifactError, CompiledCtor, CompiledMethod, CompiledUnit, Instr, LinkedCall,
    SlotLayout,
};
pub use backend::{CompileError, UnitCompiler};
pub use builtins::{BuiltinFn, BuiltinImpl, BuiltinModule, BuiltinRegistry};
pub use in_process::InProcessCompiler;
pub use interp::RunError;
pub use module::{Instance, LoadError, Module, TypeHandle};

// The value model is shared with unit definitions; re-exported so runtime
// callers don't need a direct forma_ir dependency for everyday use.
pub use forma_ir::{ScalarType, Value};
