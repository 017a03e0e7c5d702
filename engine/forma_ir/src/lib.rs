//! Unit definitions: the data model that templates build and the compiler
//! consumes.
//!
//! A [`TypeUnit`] is the mutable definition of one synthesized type. Templates
//! append members to it, the compiler lowers it into an artifact, and nothing
//! in between ever parses text: method bodies are ordered [`Op`] lists, not
//! source strings.
//!
//! # Design
//!
//! - **Declaration order is meaning.** Members keep the order templates
//!   declared them in; slot and constructor ordinals fall out of that order,
//!   so two identical template runs produce identical artifacts.
//! - **Names are paint.** [`TypeName`], [`ContractId`], and [`RefId`] are
//!   distinct newtypes so a unit name can never be confused with an external
//!   capability reference at a call site.
//! - **Values before types.** Every declarable slot has a [`ScalarType`] and
//!   every type has a well-known default, so a freshly constructed instance is
//!   fully initialized before any constructor body runs.

pub mod name;
pub mod ops;
pub mod unit;
pub mod value;

pub use name::{ContractId, RefId, TypeName};
pub use ops::Op;
pub use unit::{CtorDef, DefError, FieldDef, MemberKind, MethodDef, PropertyDef, TypeUnit};
pub use value::{ScalarType, Value};
