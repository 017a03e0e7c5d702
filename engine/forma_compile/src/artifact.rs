//! The compiled, serializable form of a unit batch.
//!
//! An artifact is what a backend returns and what crosses the wire from a
//! remote host: fully lowered units plus the reference set they were linked
//! against, with any warnings riding along. Everything here is plain data
//! with stable `bincode` round-tripping.

use std::collections::BTreeSet;

use forma_diagnostic::Diagnostic;
use forma_ir::{ContractId, RefId, ScalarType, TypeName, Value};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Artifact bytes that cannot be produced or understood.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to encode artifact")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode artifact")]
    Decode(#[source] bincode::Error),
}

/// Value-slot layout of one compiled type: slot per declared field or
/// property backing field, in declaration order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotLayout {
    names: Vec<String>,
    index: FxHashMap<String, u32>,
}

impl SlotLayout {
    /// Build a layout from slot names in declaration order. Names must be
    /// unique; the unit enforces that long before lowering.
    pub(crate) fn from_names(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i as u32))
            .collect();
        Self { names, index }
    }

    #[must_use]
    pub fn slot(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    /// Slot names in slot order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One lowered instruction. Field names are resolved to slots, constants to
/// pool entries, and calls to link-table entries.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    PushConst(u32),
    LoadSlot(u32),
    StoreSlot(u32),
    LoadArg(u8),
    Call(u32),
    Ret,
}

/// A call site resolved against the builtin registry at lowering time.
/// Load verifies the target is still provided before anything runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkedCall {
    pub module: RefId,
    pub name: String,
    pub argc: u8,
}

/// A lowered method body, including synthesized property accessors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledMethod {
    pub name: String,
    pub params: Vec<ScalarType>,
    pub ret: Option<ScalarType>,
    pub code: Vec<Instr>,
}

/// A lowered constructor body. Runs after slots take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledCtor {
    pub params: Vec<ScalarType>,
    pub code: Vec<Instr>,
}

/// One fully lowered type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledUnit {
    pub name: TypeName,
    pub bases: Vec<ContractId>,
    /// Member names in declaration order; synthesized accessors appear
    /// directly after their property.
    pub members: Vec<String>,
    pub layout: SlotLayout,
    /// Initial slot values, one per layout slot.
    pub defaults: Vec<Value>,
    pub methods: Vec<CompiledMethod>,
    /// Ordinal 0 is the implicit defaults constructor.
    pub ctors: Vec<CompiledCtor>,
    pub pool: Vec<Value>,
    pub links: Vec<LinkedCall>,
}

impl CompiledUnit {
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&CompiledMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    #[must_use]
    pub fn ctor(&self, index: usize) -> Option<&CompiledCtor> {
        self.ctors.get(index)
    }
}

/// Everything one compile produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub units: Vec<CompiledUnit>,
    /// The reference set the units were linked against.
    pub references: BTreeSet<RefId>,
    /// Non-fatal diagnostics. Never block loading or caching.
    pub warnings: Vec<Diagnostic>,
}

impl Artifact {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        bincode::serialize(self).map_err(ArtifactError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        bincode::deserialize(bytes).map_err(ArtifactError::Decode)
    }

    #[must_use]
    pub fn unit(&self, name: &TypeName) -> Option<&CompiledUnit> {
        self.units.iter().find(|u| u.name == *name)
    }
}
