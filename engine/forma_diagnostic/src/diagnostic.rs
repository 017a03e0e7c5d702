use std::fmt;

use forma_ir::TypeName;
use serde::{Deserialize, Serialize};

use crate::DiagCode;

/// Severity level for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Where in a unit a diagnostic points: the unit, optionally one member.
///
/// Units are built from data, not parsed text, so locations name declarations
/// rather than source spans.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Location {
    pub unit: TypeName,
    pub member: Option<String>,
}

impl Location {
    pub fn unit(unit: TypeName) -> Self {
        Location { unit, member: None }
    }

    pub fn member(unit: TypeName, member: impl Into<String>) -> Self {
        Location {
            unit,
            member: Some(member.into()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{}::{member}", self.unit),
            None => write!(f, "{}", self.unit),
        }
    }
}

/// A compile diagnostic with the context needed for a useful message.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[must_use = "diagnostics should be reported or returned, not silently dropped"]
pub struct Diagnostic {
    /// Code for searchability.
    pub code: DiagCode,
    /// Severity level.
    pub severity: Severity,
    /// Main message.
    pub message: String,
    /// The declaration the diagnostic points at, if any.
    pub location: Option<Location>,
    /// Additional notes providing context.
    pub notes: Vec<String>,
}

impl Diagnostic {
    fn new_with_severity(code: DiagCode, severity: Severity) -> Self {
        Diagnostic {
            code,
            severity,
            message: String::new(),
            location: None,
            notes: Vec::new(),
        }
    }

    /// Create a new error diagnostic.
    pub fn error(code: DiagCode) -> Self {
        Self::new_with_severity(code, Severity::Error)
    }

    /// Create a new warning diagnostic.
    pub fn warning(code: DiagCode) -> Self {
        Self::new_with_severity(code, Severity::Warning)
    }

    /// Set the main message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Point the diagnostic at a whole unit.
    pub fn at_unit(mut self, unit: TypeName) -> Self {
        self.location = Some(Location::unit(unit));
        self
    }

    /// Point the diagnostic at one member of a unit.
    pub fn at_member(mut self, unit: TypeName, member: impl Into<String>) -> Self {
        self.location = Some(Location::member(unit, member));
        self
    }

    /// Add a note providing additional context.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Check if this is an error (vs warning).
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.code, self.message)?;

        if let Some(location) = &self.location {
            write!(f, "\n  --> {location}")?;
        }

        for note in &self.notes {
            write!(f, "\n  = note: {note}")?;
        }

        Ok(())
    }
}

/// Render a diagnostic batch the way the host binary and logs print it:
/// one diagnostic per paragraph, errors first in input order.
#[must_use]
pub fn render_all(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for (i, diag) in diagnostics.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        out.push_str(&diag.to_string());
    }
    out
}

/// True if any diagnostic in the batch is an error.
#[must_use]
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Configuration for an operand type mismatch diagnostic.
///
/// This config struct pattern keeps the call sites readable for a
/// diagnostic with this many fields.
#[derive(Clone, Debug)]
pub struct TypeMismatchConfig<'a> {
    /// The unit being lowered.
    pub unit: TypeName,
    /// The member whose body tripped the mismatch.
    pub member: &'a str,
    /// The expected type name.
    pub expected: &'a str,
    /// The found type name.
    pub found: &'a str,
    /// Context describing where the mismatch occurred (e.g. "return value").
    pub context: &'a str,
}

impl TypeMismatchConfig<'_> {
    /// Convert this configuration into a diagnostic.
    pub fn into_diagnostic(self) -> Diagnostic {
        Diagnostic::error(DiagCode::E1006)
            .with_message(format!(
                "type mismatch: expected `{}`, found `{}`",
                self.expected, self.found
            ))
            .at_member(self.unit, self.member)
            .with_note(format!("in {}", self.context))
    }
}

/// Create an "unknown field" diagnostic.
pub fn unknown_field(unit: TypeName, member: &str, field: &str) -> Diagnostic {
    Diagnostic::error(DiagCode::E1001)
        .with_message(format!("unknown field `{field}`"))
        .at_member(unit, member)
}

/// Create an "unregistered reference" diagnostic.
///
/// A body may only call into capability modules the emission registered as
/// references before compiling.
pub fn unregistered_reference(unit: TypeName, member: &str, module: &str) -> Diagnostic {
    Diagnostic::error(DiagCode::E2001)
        .with_message(format!(
            "call into `{module}`, which is not a registered reference"
        ))
        .at_member(unit, member)
        .with_note("register the module with `ensure_reference` before compiling")
}

/// Create an "unknown capability module" diagnostic.
pub fn unknown_module(unit: TypeName, member: &str, module: &str) -> Diagnostic {
    Diagnostic::error(DiagCode::E2002)
        .with_message(format!("no capability module named `{module}`"))
        .at_member(unit, member)
}

/// Create an "unknown capability function" diagnostic.
pub fn unknown_builtin(unit: TypeName, member: &str, module: &str, name: &str) -> Diagnostic {
    Diagnostic::error(DiagCode::E2003)
        .with_message(format!("module `{module}` has no function `{name}`"))
        .at_member(unit, member)
}
