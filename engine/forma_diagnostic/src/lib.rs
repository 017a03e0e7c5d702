//! Diagnostics for unit compilation.
//!
//! - Codes for searchability
//! - Clear messages (what went wrong)
//! - Declaration locations (which unit, which member)
//! - Notes (why it's wrong, what to do)
//!
//! Rejected compilations carry `Vec<Diagnostic>` back to the caller, and
//! across the wire from a remote host, so everything here serializes.
//! Warnings travel the same way but never fail a compilation.

mod code;
mod diagnostic;

pub use code::DiagCode;
pub use diagnostic::{
    has_errors, render_all, unknown_builtin, unknown_field, unknown_module,
    unregistered_reference, Diagnostic, Location, Severity, TypeMismatchConfig,
};
