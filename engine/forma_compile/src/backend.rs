//! The compiler backend seam.

use std::collections::BTreeSet;

use forma_diagnostic::Diagnostic;
use forma_ir::{RefId, TypeUnit};
use thiserror::Error;

use crate::artifact::{Artifact, ArtifactError};

/// Turns emitted unit definitions into a loadable artifact.
///
/// Backends are interchangeable: the in-process one lowers on the calling
/// thread, the remote one ships the same inputs to a compiler host process.
/// For equivalent inputs both must produce observably equivalent compiled
/// types, so callers choose a backend for operational reasons only.
pub trait UnitCompiler: Send + Sync {
    fn compile(
        &self,
        units: &[TypeUnit],
        references: &BTreeSet<RefId>,
    ) -> Result<Artifact, CompileError>;
}

/// Why a compile produced no artifact.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The units were understood and rejected. Carries every diagnostic the
    /// lowering gathered, warnings included.
    #[error("compilation rejected ({} diagnostic(s))", .0.len())]
    Rejected(Vec<Diagnostic>),

    /// The remote backend could not reach a compiler host. Never silently
    /// downgraded to in-process compilation.
    #[error("compiler host at {endpoint} is unavailable: {detail}")]
    HostUnavailable { endpoint: String, detail: String },

    /// Artifact bytes could not be produced or understood.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl CompileError {
    /// The diagnostics of a rejection, empty for other failures.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Rejected(diags) => diags,
            _ => &[],
        }
    }
}
