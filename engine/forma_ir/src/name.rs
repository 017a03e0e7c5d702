//! Identifier newtypes.
//!
//! Three kinds of names flow through the engine and none of them is
//! interchangeable with another: the name of a synthesized type, the
//! identity of a contract it fulfils, and the identifier of an external
//! capability module its bodies may call into.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of one synthesized type.
///
/// Unique within a module; also the display component of a synthesis key.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Identity of a logical contract a synthesized type declares it fulfils.
///
/// Contracts are opaque to the engine: declaring one is a claim later
/// templates can observe, not something the compiler checks bodies against.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ContractId(String);

impl ContractId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContractId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of an external capability module method bodies may call.
///
/// A unit that calls `time.now_millis` carries `RefId("std.time")` in the
/// call op; compilation rejects the unit unless a matching reference was
/// registered with the backend first.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct RefId(String);

impl RefId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RefId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
