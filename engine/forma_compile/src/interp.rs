//! Execution of lowered bodies against instance slots.
//!
//! Bodies arrive fully checked: lowering typed the operand stack and module
//! load verified every index, so the interpreter's error paths exist only
//! for artifacts that dodged verification. It never panics on them.

use forma_ir::{ScalarType, TypeName, Value};
use smallvec::SmallVec;
use thiserror::Error;

use crate::artifact::{CompiledUnit, Instr};
use crate::builtins::BuiltinRegistry;

/// Instantiation or call failures surfaced to the factory layer.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("type `{unit}` has no field `{field}`")]
    UnknownField { unit: TypeName, field: String },

    #[error("type `{unit}` has no method `{method}`")]
    UnknownMethod { unit: TypeName, method: String },

    #[error("constructor {index} out of range; `{unit}` has {available} constructor(s)")]
    CtorOutOfRange {
        unit: TypeName,
        index: usize,
        available: usize,
    },

    #[error("`{unit}::{member}` takes {expected} argument(s), got {found}")]
    ArgCount {
        unit: TypeName,
        member: String,
        expected: usize,
        found: usize,
    },

    #[error("argument {index} of `{unit}::{member}` must be {expected}, got {found}")]
    ArgType {
        unit: TypeName,
        member: String,
        index: usize,
        expected: ScalarType,
        found: ScalarType,
    },

    #[error("field `{field}` of `{unit}` holds {expected}, got {found}")]
    FieldType {
        unit: TypeName,
        field: String,
        expected: ScalarType,
        found: ScalarType,
    },

    #[error("artifact for `{unit}` is malformed: {detail}")]
    Malformed { unit: TypeName, detail: &'static str },
}

/// Check caller-supplied arguments against a declared parameter list.
pub(crate) fn check_args(
    unit: &TypeName,
    member: &str,
    params: &[ScalarType],
    args: &[Value],
) -> Result<(), RunError> {
    if args.len() != params.len() {
        return Err(RunError::ArgCount {
            unit: unit.clone(),
            member: member.to_owned(),
            expected: params.len(),
            found: args.len(),
        });
    }
    for (index, (param, arg)) in params.iter().zip(args).enumerate() {
        if !arg.is_of(*param) {
            return Err(RunError::ArgType {
                unit: unit.clone(),
                member: member.to_owned(),
                index,
                expected: *param,
                found: arg.scalar_type(),
            });
        }
    }
    Ok(())
}

/// Run one lowered body. Returns the value left by `ret`, if any.
pub(crate) fn run_body(
    unit: &CompiledUnit,
    code: &[Instr],
    args: &[Value],
    slots: &mut [Value],
    registry: &BuiltinRegistry,
) -> Result<Option<Value>, RunError> {
    let malformed = |detail| RunError::Malformed {
        unit: unit.name.clone(),
        detail,
    };

    let mut stack: SmallVec<[Value; 8]> = SmallVec::new();
    for instr in code {
        match *instr {
            Instr::PushConst(idx) => {
                let value = unit
                    .pool
                    .get(idx as usize)
                    .ok_or_else(|| malformed("constant index out of range"))?;
                stack.push(value.clone());
            }
            Instr::LoadSlot(slot) => {
                let value = slots
                    .get(slot as usize)
                    .ok_or_else(|| malformed("slot index out of range"))?;
                stack.push(value.clone());
            }
            Instr::StoreSlot(slot) => {
                let value = stack
                    .pop()
                    .ok_or_else(|| malformed("operand stack underflow"))?;
                let target = slots
                    .get_mut(slot as usize)
                    .ok_or_else(|| malformed("slot index out of range"))?;
                *target = value;
            }
            Instr::LoadArg(index) => {
                let value = args
                    .get(usize::from(index))
                    .ok_or_else(|| malformed("argument index out of range"))?;
                stack.push(value.clone());
            }
            Instr::Call(idx) => {
                let link = unit
                    .links
                    .get(idx as usize)
                    .ok_or_else(|| malformed("link index out of range"))?;
                let builtin = registry
                    .lookup(&link.module, &link.name)
                    .ok_or_else(|| malformed("unresolved builtin link"))?;
                let at = stack
                    .len()
                    .checked_sub(usize::from(link.argc))
                    .ok_or_else(|| malformed("operand stack underflow"))?;
                let result = builtin.invoke(&stack[at..]);
                stack.truncate(at);
                stack.push(result);
            }
            Instr::Ret => return Ok(stack.pop()),
        }
    }
    // Lowered bodies always end with `ret`.
    Err(malformed("body did not terminate with ret"))
}
