//! Loaded modules, type handles, and live instances.
//!
//! A [`Module`] is the runtime home of compiled types: loading an artifact
//! verifies it against the builtin registry, then installs one shareable
//! [`TypeHandle`] per unit. Each library owns exactly one module; handles
//! are cheap to clone out of it and instances borrow nothing from it.

use std::sync::Arc;

use forma_ir::{ContractId, RefId, TypeName, Value};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::artifact::{Artifact, CompiledUnit, Instr};
use crate::builtins::BuiltinRegistry;
use crate::interp::{check_args, run_body, RunError};

/// An artifact this runtime refuses to load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("module already has a type named `{0}`")]
    DuplicateType(TypeName),

    #[error("artifact calls `{module}.{name}`, which this runtime does not provide")]
    MissingCapability { module: RefId, name: String },

    #[error("artifact unit `{unit}` is malformed: {detail}")]
    Malformed { unit: TypeName, detail: &'static str },
}

/// One loaded, instantiable type.
#[derive(Debug)]
pub struct TypeHandle {
    unit: CompiledUnit,
    registry: Arc<BuiltinRegistry>,
}

impl TypeHandle {
    #[must_use]
    pub fn name(&self) -> &TypeName {
        &self.unit.name
    }

    #[must_use]
    pub fn bases(&self) -> &[ContractId] {
        &self.unit.bases
    }

    #[must_use]
    pub fn has_base(&self, base: &ContractId) -> bool {
        self.unit.bases.contains(base)
    }

    /// Member names in declaration order, synthesized accessors included.
    #[must_use]
    pub fn members(&self) -> &[String] {
        &self.unit.members
    }

    /// Field slot names in slot order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        self.unit.layout.names()
    }

    #[must_use]
    pub fn ctor_count(&self) -> usize {
        self.unit.ctors.len()
    }

    /// Run the constructor at `ctor_index` and return the new instance.
    /// Slots take their declared defaults before the body runs.
    pub fn instantiate(
        self: &Arc<Self>,
        ctor_index: usize,
        args: &[Value],
    ) -> Result<Instance, RunError> {
        let Some(ctor) = self.unit.ctors.get(ctor_index) else {
            return Err(RunError::CtorOutOfRange {
                unit: self.unit.name.clone(),
                index: ctor_index,
                available: self.unit.ctors.len(),
            });
        };
        let member = format!("ctor {ctor_index}");
        check_args(&self.unit.name, &member, &ctor.params, args)?;

        let mut slots = self.unit.defaults.clone();
        run_body(&self.unit, &ctor.code, args, &mut slots, &self.registry)?;
        Ok(Instance {
            handle: Arc::clone(self),
            slots,
        })
    }
}

/// A live instance: a handle plus one value per slot.
#[derive(Debug)]
pub struct Instance {
    handle: Arc<TypeHandle>,
    slots: Vec<Value>,
}

impl Instance {
    #[must_use]
    pub fn type_name(&self) -> &TypeName {
        self.handle.name()
    }

    #[must_use]
    pub fn handle(&self) -> &Arc<TypeHandle> {
        &self.handle
    }

    /// Read a field slot directly.
    pub fn get(&self, field: &str) -> Result<&Value, RunError> {
        let slot = self.slot_of(field)?;
        self.slots
            .get(slot)
            .ok_or_else(|| self.malformed("slot index out of range"))
    }

    /// Write a field slot directly. The value must inhabit the declared type.
    pub fn set(&mut self, field: &str, value: Value) -> Result<(), RunError> {
        let slot = self.slot_of(field)?;
        let current = self
            .slots
            .get_mut(slot)
            .ok_or_else(|| RunError::Malformed {
                unit: self.handle.unit.name.clone(),
                detail: "slot index out of range",
            })?;
        if !value.is_of(current.scalar_type()) {
            return Err(RunError::FieldType {
                unit: self.handle.unit.name.clone(),
                field: field.to_owned(),
                expected: current.scalar_type(),
                found: value.scalar_type(),
            });
        }
        *current = value;
        Ok(())
    }

    /// Call a method (declared or synthesized accessor) on this instance.
    pub fn call(&mut self, method: &str, args: &[Value]) -> Result<Option<Value>, RunError> {
        let unit = &self.handle.unit;
        let Some(compiled) = unit.method(method) else {
            return Err(RunError::UnknownMethod {
                unit: unit.name.clone(),
                method: method.to_owned(),
            });
        };
        check_args(&unit.name, method, &compiled.params, args)?;
        run_body(
            unit,
            &compiled.code,
            args,
            &mut self.slots,
            &self.handle.registry,
        )
    }

    fn slot_of(&self, field: &str) -> Result<usize, RunError> {
        self.handle
            .unit
            .layout
            .slot(field)
            .map(|s| s as usize)
            .ok_or_else(|| RunError::UnknownField {
                unit: self.handle.unit.name.clone(),
                field: field.to_owned(),
            })
    }

    fn malformed(&self, detail: &'static str) -> RunError {
        RunError::Malformed {
            unit: self.handle.unit.name.clone(),
            detail,
        }
    }
}

/// The runtime home of every type one library has loaded.
pub struct Module {
    registry: Arc<BuiltinRegistry>,
    types: RwLock<FxHashMap<TypeName, Arc<TypeHandle>>>,
}

impl Module {
    pub fn new(registry: Arc<BuiltinRegistry>) -> Self {
        Self {
            registry,
            types: RwLock::new(FxHashMap::default()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<BuiltinRegistry> {
        &self.registry
    }

    /// Verify an artifact and install its types. Returns the new handles in
    /// artifact order. Nothing installs if any unit fails verification.
    pub fn install(&self, artifact: &Artifact) -> Result<Vec<Arc<TypeHandle>>, LoadError> {
        for unit in &artifact.units {
            verify_unit(unit, &self.registry)?;
        }

        let mut types = self.types.write();
        for unit in &artifact.units {
            if types.contains_key(&unit.name) {
                return Err(LoadError::DuplicateType(unit.name.clone()));
            }
        }
        let mut handles = Vec::with_capacity(artifact.units.len());
        for unit in &artifact.units {
            let handle = Arc::new(TypeHandle {
                unit: unit.clone(),
                registry: Arc::clone(&self.registry),
            });
            types.insert(unit.name.clone(), Arc::clone(&handle));
            handles.push(handle);
        }
        tracing::debug!(types = handles.len(), total = types.len(), "installed artifact");
        Ok(handles)
    }

    #[must_use]
    pub fn get(&self, name: &TypeName) -> Option<Arc<TypeHandle>> {
        self.types.read().get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &TypeName) -> bool {
        self.types.read().contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    /// Names of every loaded type, unordered.
    #[must_use]
    pub fn type_names(&self) -> Vec<TypeName> {
        self.types.read().keys().cloned().collect()
    }
}

/// Structural verification: every index a body can touch must be in range
/// and every linked call must resolve. Runs once at load so the interpreter
/// never meets an out-of-range index from a well-loaded module.
fn verify_unit(unit: &CompiledUnit, registry: &BuiltinRegistry) -> Result<(), LoadError> {
    let malformed = |detail| LoadError::Malformed {
        unit: unit.name.clone(),
        detail,
    };

    if unit.defaults.len() != unit.layout.len() {
        return Err(malformed("default count does not match slot count"));
    }
    if unit.ctors.is_empty() {
        return Err(malformed("missing implicit default constructor"));
    }
    for link in &unit.links {
        let Some(builtin) = registry.lookup(&link.module, &link.name) else {
            return Err(LoadError::MissingCapability {
                module: link.module.clone(),
                name: link.name.clone(),
            });
        };
        if builtin.params.len() != usize::from(link.argc) {
            return Err(malformed("link arity does not match provided builtin"));
        }
    }

    let check_code = |code: &[Instr], params: usize| -> Result<(), LoadError> {
        for instr in code {
            match *instr {
                Instr::PushConst(idx) => {
                    if idx as usize >= unit.pool.len() {
                        return Err(malformed("constant index out of range"));
                    }
                }
                Instr::LoadSlot(slot) | Instr::StoreSlot(slot) => {
                    if slot as usize >= unit.layout.len() {
                        return Err(malformed("slot index out of range"));
                    }
                }
                Instr::LoadArg(index) => {
                    if usize::from(index) >= params {
                        return Err(malformed("argument index out of range"));
                    }
                }
                Instr::Call(idx) => {
                    if idx as usize >= unit.links.len() {
                        return Err(malformed("link index out of range"));
                    }
                }
                Instr::Ret => {}
            }
        }
        Ok(())
    };

    for method in &unit.methods {
        check_code(&method.code, method.params.len())?;
    }
    for ctor in &unit.ctors {
        check_code(&ctor.code, ctor.params.len())?;
    }
    Ok(())
}
