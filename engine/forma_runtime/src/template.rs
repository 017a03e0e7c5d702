//! Templates and pipelines: the declarative side of synthesis.

use forma_ir::DefError;
use thiserror::Error;

use crate::context::EmitContext;

/// Why a template refused to apply.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A declaration clashed with what an earlier template produced, e.g. a
    /// duplicate member name or base contract.
    #[error(transparent)]
    Def(#[from] DefError),

    /// The template's own preconditions did not hold.
    #[error("{0}")]
    Failed(String),
}

impl TemplateError {
    pub fn failed(message: impl Into<String>) -> Self {
        TemplateError::Failed(message.into())
    }
}

/// One declarative synthesis step.
///
/// A template owns no engine state: it reads and writes the [`EmitContext`]
/// it is handed and nothing else. It sees everything earlier templates in
/// the pipeline produced, may assume nothing about later ones, and should
/// consult the context bag before making exactly-once declarations. Any
/// error fails the whole synthesis; partially emitted units are never
/// compiled.
pub trait Template: Send + Sync {
    /// Short stable name used in error reports and logs.
    fn name(&self) -> &str;

    /// Apply this step to the evolving unit.
    fn apply(&self, cx: &mut EmitContext) -> Result<(), TemplateError>;
}

/// Append-only assembly of a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    templates: Vec<Box<dyn Template>>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a template. Order is meaning: templates run exactly in
    /// insertion order, never reordered or deduplicated.
    pub fn push(&mut self, template: impl Template + 'static) -> &mut Self {
        self.templates.push(Box::new(template));
        self
    }

    /// Append an already-boxed template.
    pub fn push_boxed(&mut self, template: Box<dyn Template>) -> &mut Self {
        self.templates.push(template);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    #[must_use]
    pub fn finish(self) -> Pipeline {
        Pipeline {
            templates: self.templates,
        }
    }
}

/// An ordered, immutable template sequence. Once synthesis starts the
/// pipeline cannot change.
pub struct Pipeline {
    templates: Vec<Box<dyn Template>>,
}

impl Pipeline {
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Templates in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Template> {
        self.templates.iter().map(Box::as_ref)
    }
}
