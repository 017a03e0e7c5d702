//! The per-synthesis emission context templates write into.

use std::collections::BTreeSet;

use forma_ir::{RefId, TypeName, TypeUnit, Value};
use rustc_hash::FxHashMap;

/// Everything one synthesis accumulates: the evolving unit definition, the
/// external references its bodies may call, and a scratch bag for
/// inter-template coordination.
///
/// A context is single-use. It is created fresh for one synthesis, every
/// template in the pipeline sees what the earlier ones produced, and the
/// finished unit plus reference set go to the compiler backend.
pub struct EmitContext {
    unit: TypeUnit,
    references: BTreeSet<RefId>,
    bag: FxHashMap<String, Value>,
}

impl EmitContext {
    pub fn new(name: TypeName) -> Self {
        Self {
            unit: TypeUnit::new(name),
            references: BTreeSet::new(),
            bag: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn unit(&self) -> &TypeUnit {
        &self.unit
    }

    /// The evolving unit definition. Declarations go through the unit's own
    /// `add_*` operations, which enforce the shared member namespace.
    pub fn unit_mut(&mut self) -> &mut TypeUnit {
        &mut self.unit
    }

    #[must_use]
    pub fn references(&self) -> &BTreeSet<RefId> {
        &self.references
    }

    /// Register an external reference. Idempotent; returns true when the
    /// reference was not registered before.
    pub fn ensure_reference(&mut self, id: RefId) -> bool {
        self.references.insert(id)
    }

    /// Read a coordination note an earlier template left.
    #[must_use]
    pub fn bag_get(&self, key: &str) -> Option<&Value> {
        self.bag.get(key)
    }

    /// Leave a coordination note for later templates. Returns the previous
    /// value under that key, if any.
    pub fn bag_set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.bag.insert(key.into(), value)
    }

    /// True when some template already left a note under `key`. The usual
    /// guard for exactly-once declarations.
    #[must_use]
    pub fn bag_contains(&self, key: &str) -> bool {
        self.bag.contains_key(key)
    }

    /// Tear the context apart for compilation. The bag is scratch state and
    /// does not outlive the synthesis.
    pub(crate) fn into_parts(self) -> (TypeUnit, BTreeSet<RefId>) {
        (self.unit, self.references)
    }
}
