//! Synthesis and factory failures.

use forma_compile::{CompileError, LoadError, RunError};
use forma_diagnostic::Diagnostic;
use thiserror::Error;

use crate::key::TypeKey;
use crate::template::TemplateError;

/// Why `ensure_written` installed nothing.
///
/// Every arm names the key it failed for, and no failure is cached: a later
/// call with the same key retries the whole synthesis from scratch.
#[derive(Debug, Error)]
pub enum SynthError {
    /// A template refused to apply. Names the failing template.
    #[error("template `{template}` failed while synthesizing {key}: {source}")]
    Template {
        key: TypeKey,
        template: String,
        #[source]
        source: TemplateError,
    },

    /// The backend understood the emitted unit and rejected it.
    #[error("compilation of {key} was rejected ({} diagnostic(s))", .diagnostics.len())]
    Compile {
        key: TypeKey,
        diagnostics: Vec<Diagnostic>,
    },

    /// The backend could not answer at all: unreachable compiler host,
    /// undecodable artifact bytes. Distinct from a rejection, and never
    /// downgraded to an in-process retry.
    #[error("compiler backend failed for {key}: {source}")]
    Host {
        key: TypeKey,
        #[source]
        source: CompileError,
    },

    /// The compiled artifact did not pass load verification against this
    /// library's builtin registry.
    #[error("artifact for {key} could not be loaded: {source}")]
    Load {
        key: TypeKey,
        #[source]
        source: LoadError,
    },

    /// The caller's cancel token fired at a stage boundary.
    #[error("synthesis of {key} was cancelled")]
    Cancelled { key: TypeKey },
}

impl SynthError {
    /// The diagnostics of a compile rejection, empty otherwise.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            SynthError::Compile { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }

    /// The key the failed synthesis was for.
    #[must_use]
    pub fn key(&self) -> &TypeKey {
        match self {
            SynthError::Template { key, .. }
            | SynthError::Compile { key, .. }
            | SynthError::Host { key, .. }
            | SynthError::Load { key, .. }
            | SynthError::Cancelled { key } => key,
        }
    }
}

/// Why `create_instance` produced nothing.
///
/// These are caller-contract violations: reported, never retried, and never
/// touching the cache.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// The key has not been written in this library.
    #[error("no written type for {key}")]
    TypeNotFound { key: TypeKey },

    /// The constructor ordinal is out of range for the written type.
    #[error("constructor {index} out of range for {key} ({available} available)")]
    CtorNotFound {
        key: TypeKey,
        index: usize,
        available: usize,
    },

    /// The constructor was found but failed to run, e.g. wrong argument
    /// count or types.
    #[error(transparent)]
    Ctor(#[from] RunError),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn synth_errors_name_template_and_key() {
        let err = SynthError::Template {
            key: TypeKey::with_discriminator("app.Audit", "v2"),
            template: "add_id".into(),
            source: TemplateError::failed("id already declared"),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("add_id"));
        assert!(rendered.contains("app.Audit/v2"));
        assert!(err.diagnostics().is_empty());
    }

    #[test]
    fn factory_errors_report_the_available_count() {
        let err = FactoryError::CtorNotFound {
            key: TypeKey::new("app.Audit"),
            index: 7,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "constructor 7 out of range for app.Audit (2 available)"
        );
    }
}
