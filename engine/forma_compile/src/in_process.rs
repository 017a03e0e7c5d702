//! The in-process backend: validate and lower on the calling thread.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use forma_ir::{RefId, TypeUnit};

use crate::artifact::Artifact;
use crate::backend::{CompileError, UnitCompiler};
use crate::builtins::BuiltinRegistry;
use crate::lower::lower_units;

/// Synchronous compilation against a builtin registry, no process boundary.
pub struct InProcessCompiler {
    registry: Arc<BuiltinRegistry>,
}

impl InProcessCompiler {
    /// A compiler providing the standard capability modules.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(BuiltinRegistry::standard()))
    }

    pub fn with_registry(registry: Arc<BuiltinRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<BuiltinRegistry> {
        &self.registry
    }
}

impl Default for InProcessCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitCompiler for InProcessCompiler {
    fn compile(
        &self,
        units: &[TypeUnit],
        references: &BTreeSet<RefId>,
    ) -> Result<Artifact, CompileError> {
        let start = Instant::now();
        let output =
            lower_units(units, references, &self.registry).map_err(CompileError::Rejected)?;
        tracing::debug!(
            units = units.len(),
            warnings = output.warnings.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "compiled unit batch in process"
        );
        Ok(Artifact {
            units: output.units,
            references: references.clone(),
            warnings: output.warnings,
        })
    }
}
