use std::fmt;

use serde::{Deserialize, Serialize};

/// Codes for all compile diagnostics.
///
/// Format: E#### where the first digit indicates the phase:
/// - E0xxx: Unit structure errors
/// - E1xxx: Body lowering errors
/// - E2xxx: Reference and linking errors
/// - E9xxx: Internal limits
/// - Wxxxx: Warnings
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum DiagCode {
    // Unit structure (E0xxx)
    /// Synthesized accessor name collides with a declared member
    E0001,
    /// Two units in one compile request share a name
    E0002,

    // Body lowering (E1xxx)
    /// Body refers to a field the unit does not declare
    E1001,
    /// Operand stack underflow
    E1002,
    /// Operand stack not empty where the body must leave it empty
    E1003,
    /// Body does not end with `ret`
    E1004,
    /// Argument index out of range for the body's parameter list
    E1005,
    /// Operand type mismatch
    E1006,

    // References and linking (E2xxx)
    /// Call into a module that was not registered as a reference
    E2001,
    /// Reference names a capability module the backend does not provide
    E2002,
    /// Capability module has no function of that name
    E2003,
    /// Call arity differs from the capability function's arity
    E2004,

    // Internal limits (E9xxx)
    /// Constant pool exceeded its index range
    E9001,

    // Warnings (Wxxxx)
    /// Registered reference never used by any body
    W1001,
    /// Property declares neither accessor
    W1002,
}

impl DiagCode {
    /// The code as text (e.g. "E2001").
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DiagCode::E0001 => "E0001",
            DiagCode::E0002 => "E0002",
            DiagCode::E1001 => "E1001",
            DiagCode::E1002 => "E1002",
            DiagCode::E1003 => "E1003",
            DiagCode::E1004 => "E1004",
            DiagCode::E1005 => "E1005",
            DiagCode::E1006 => "E1006",
            DiagCode::E2001 => "E2001",
            DiagCode::E2002 => "E2002",
            DiagCode::E2003 => "E2003",
            DiagCode::E2004 => "E2004",
            DiagCode::E9001 => "E9001",
            DiagCode::W1001 => "W1001",
            DiagCode::W1002 => "W1002",
        }
    }

    /// Check if this is a warning code (Wxxx range).
    #[must_use]
    pub fn is_warning(self) -> bool {
        self.as_str().starts_with('W')
    }

    /// Check if this is a reference/linking error (E2xxx range).
    #[must_use]
    pub fn is_link_error(self) -> bool {
        self.as_str().starts_with("E2")
    }
}

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_display_matches_as_str() {
        assert_eq!(DiagCode::E2001.to_string(), "E2001");
        assert_eq!(DiagCode::W1001.as_str(), "W1001");
    }

    #[test]
    fn warning_codes_are_recognized() {
        assert!(DiagCode::W1001.is_warning());
        assert!(!DiagCode::E1001.is_warning());
        assert!(DiagCode::E2003.is_link_error());
    }
}
