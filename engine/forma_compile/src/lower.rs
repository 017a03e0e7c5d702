//! Validation and lowering of unit definitions into compiled units.
//!
//! Lowering is where declarations become enforceable: field names resolve to
//! slots, bodies are checked op by op against a typed operand stack, and
//! every builtin call is linked against the reference set and the registry.
//! One diagnostic per failing body; lowering keeps going so a rejection
//! reports every broken member, not just the first.

use std::collections::BTreeSet;

use forma_diagnostic::{
    has_errors, unknown_builtin, unknown_field, unknown_module, unregistered_reference, DiagCode,
    Diagnostic, TypeMismatchConfig,
};
use forma_ir::{MemberKind, MethodDef, Op, RefId, ScalarType, TypeName, TypeUnit, Value};

use crate::artifact::{CompiledCtor, CompiledMethod, CompiledUnit, Instr, LinkedCall, SlotLayout};
use crate::builtins::BuiltinRegistry;

pub(crate) struct LowerOutput {
    pub units: Vec<CompiledUnit>,
    pub warnings: Vec<Diagnostic>,
}

/// Lower a unit batch. `Err` carries every diagnostic gathered, errors and
/// warnings both; `Ok` carries only warnings.
pub(crate) fn lower_units(
    units: &[TypeUnit],
    references: &BTreeSet<RefId>,
    registry: &BuiltinRegistry,
) -> Result<LowerOutput, Vec<Diagnostic>> {
    let mut diags = Vec::new();

    let mut seen = BTreeSet::new();
    for unit in units {
        if !seen.insert(unit.name()) {
            diags.push(
                Diagnostic::error(DiagCode::E0002)
                    .with_message(format!("duplicate unit name `{}`", unit.name()))
                    .at_unit(unit.name().clone()),
            );
        }
    }

    let mut used = BTreeSet::new();
    let mut compiled = Vec::with_capacity(units.len());
    for unit in units {
        if let Some(lowered) = lower_unit(unit, references, registry, &mut used, &mut diags) {
            compiled.push(lowered);
        }
    }

    for reference in references {
        if !used.contains(reference) {
            diags.push(
                Diagnostic::warning(DiagCode::W1001)
                    .with_message(format!("reference `{reference}` is registered but never used")),
            );
        }
    }

    if has_errors(&diags) {
        Err(diags)
    } else {
        Ok(LowerOutput {
            units: compiled,
            warnings: diags,
        })
    }
}

struct LowerCx<'a> {
    unit: &'a TypeName,
    layout: &'a SlotLayout,
    slot_types: &'a [ScalarType],
    references: &'a BTreeSet<RefId>,
    registry: &'a BuiltinRegistry,
}

impl LowerCx<'_> {
    fn slot(&self, name: &str) -> Option<(u32, ScalarType)> {
        let slot = self.layout.slot(name)?;
        let ty = *self.slot_types.get(slot as usize)?;
        Some((slot, ty))
    }
}

fn lower_unit(
    unit: &TypeUnit,
    references: &BTreeSet<RefId>,
    registry: &BuiltinRegistry,
    used: &mut BTreeSet<RefId>,
    diags: &mut Vec<Diagnostic>,
) -> Option<CompiledUnit> {
    let errors_before = diags.iter().filter(|d| d.is_error()).count();

    // Member listing plus accessor synthesis. Accessors land right after
    // their property so introspection order stays meaningful.
    let mut methods: Vec<MethodDef> = unit.methods().to_vec();
    let mut members = Vec::new();
    for (kind, name) in unit.declared_members() {
        members.push(name.clone());
        if *kind != MemberKind::Property {
            continue;
        }
        let Some(property) = unit.properties().iter().find(|p| p.field.name == *name) else {
            continue;
        };
        if !property.get && !property.set {
            diags.push(
                Diagnostic::warning(DiagCode::W1002)
                    .with_message(format!(
                        "property `{name}` declares neither accessor; its slot is unreachable"
                    ))
                    .at_member(unit.name().clone(), name.clone()),
            );
        }
        let field = &property.field;
        if property.get {
            let accessor = format!("get_{name}");
            if unit.has_member(&accessor) {
                diags.push(accessor_clash(unit.name(), name, &accessor));
            } else {
                members.push(accessor.clone());
                methods.push(MethodDef::new(
                    accessor,
                    vec![],
                    Some(field.ty),
                    vec![Op::LoadField(field.name.clone()), Op::Ret],
                ));
            }
        }
        if property.set {
            let accessor = format!("set_{name}");
            if unit.has_member(&accessor) {
                diags.push(accessor_clash(unit.name(), name, &accessor));
            } else {
                members.push(accessor.clone());
                methods.push(MethodDef::new(
                    accessor,
                    vec![field.ty],
                    None,
                    vec![Op::LoadArg(0), Op::StoreField(field.name.clone()), Op::Ret],
                ));
            }
        }
    }

    let slot_names: Vec<String> = unit.slot_fields().map(|f| f.name.clone()).collect();
    let slot_types: Vec<ScalarType> = unit.slot_fields().map(|f| f.ty).collect();
    let defaults: Vec<Value> = unit.slot_fields().map(|f| f.default.clone()).collect();
    let layout = SlotLayout::from_names(slot_names);

    let cx = LowerCx {
        unit: unit.name(),
        layout: &layout,
        slot_types: &slot_types,
        references,
        registry,
    };

    let mut pool = Vec::new();
    let mut links = Vec::new();

    let mut compiled_methods = Vec::with_capacity(methods.len());
    for method in &methods {
        if let Some(code) = lower_body(
            &cx,
            &method.name,
            &method.params,
            method.ret,
            &method.body,
            &mut pool,
            &mut links,
            used,
            diags,
        ) {
            compiled_methods.push(CompiledMethod {
                name: method.name.clone(),
                params: method.params.clone(),
                ret: method.ret,
                code,
            });
        }
    }

    // Ordinal 0: the implicit defaults constructor.
    let mut ctors = vec![CompiledCtor {
        params: vec![],
        code: vec![Instr::Ret],
    }];
    for (i, ctor) in unit.ctors().iter().enumerate() {
        let member = format!("ctor {}", i + 1);
        let code = if ctor.body.is_empty() {
            Some(vec![Instr::Ret])
        } else {
            lower_body(
                &cx,
                &member,
                &ctor.params,
                None,
                &ctor.body,
                &mut pool,
                &mut links,
                used,
                diags,
            )
        };
        if let Some(code) = code {
            ctors.push(CompiledCtor {
                params: ctor.params.clone(),
                code,
            });
        }
    }

    let errors_after = diags.iter().filter(|d| d.is_error()).count();
    if errors_after > errors_before {
        return None;
    }

    tracing::trace!(
        unit = %unit.name(),
        slots = layout.len(),
        methods = compiled_methods.len(),
        ctors = ctors.len(),
        "lowered unit"
    );

    Some(CompiledUnit {
        name: unit.name().clone(),
        bases: unit.bases().to_vec(),
        members,
        layout,
        defaults,
        methods: compiled_methods,
        ctors,
        pool,
        links,
    })
}

fn accessor_clash(unit: &TypeName, property: &str, accessor: &str) -> Diagnostic {
    Diagnostic::error(DiagCode::E0001)
        .with_message(format!(
            "synthesized accessor `{accessor}` for property `{property}` collides with a declared member"
        ))
        .at_member(unit.clone(), property)
}

/// Lower one body. Pushes at most one diagnostic and returns `None` on the
/// first broken op, because the operand stack is unknown past it.
#[allow(clippy::too_many_arguments, reason = "internal helper; a config struct would just restate the call site")]
fn lower_body(
    cx: &LowerCx<'_>,
    member: &str,
    params: &[ScalarType],
    ret: Option<ScalarType>,
    ops: &[Op],
    pool: &mut Vec<Value>,
    links: &mut Vec<LinkedCall>,
    used: &mut BTreeSet<RefId>,
    diags: &mut Vec<Diagnostic>,
) -> Option<Vec<Instr>> {
    if !matches!(ops.last(), Some(Op::Ret)) {
        diags.push(
            Diagnostic::error(DiagCode::E1004)
                .with_message("body must end with `ret`")
                .at_member(cx.unit.clone(), member),
        );
        return None;
    }

    let mut code = Vec::with_capacity(ops.len());
    let mut stack: Vec<ScalarType> = Vec::new();
    let last = ops.len() - 1;

    for (i, op) in ops.iter().enumerate() {
        match op {
            Op::Const(value) => {
                let Some(idx) = intern_const(pool, value) else {
                    diags.push(
                        Diagnostic::error(DiagCode::E9001)
                            .with_message("constant pool limit exceeded")
                            .at_member(cx.unit.clone(), member),
                    );
                    return None;
                };
                code.push(Instr::PushConst(idx));
                stack.push(value.scalar_type());
            }
            Op::LoadField(name) => {
                let Some((slot, ty)) = cx.slot(name) else {
                    diags.push(unknown_field(cx.unit.clone(), member, name));
                    return None;
                };
                code.push(Instr::LoadSlot(slot));
                stack.push(ty);
            }
            Op::StoreField(name) => {
                let Some((slot, ty)) = cx.slot(name) else {
                    diags.push(unknown_field(cx.unit.clone(), member, name));
                    return None;
                };
                let Some(top) = stack.pop() else {
                    diags.push(underflow(cx.unit, member, i, op));
                    return None;
                };
                if top != ty {
                    diags.push(
                        TypeMismatchConfig {
                            unit: cx.unit.clone(),
                            member,
                            expected: ty.name(),
                            found: top.name(),
                            context: &format!("value stored to `{name}`"),
                        }
                        .into_diagnostic(),
                    );
                    return None;
                }
                code.push(Instr::StoreSlot(slot));
            }
            Op::LoadArg(index) => {
                if usize::from(*index) >= params.len() {
                    diags.push(
                        Diagnostic::error(DiagCode::E1005)
                            .with_message(format!(
                                "argument index {index} out of range; body takes {} parameter(s)",
                                params.len()
                            ))
                            .at_member(cx.unit.clone(), member),
                    );
                    return None;
                }
                code.push(Instr::LoadArg(*index));
                stack.push(params[usize::from(*index)]);
            }
            Op::CallBuiltin { module, name, argc } => {
                let Some(idx) = lower_call(
                    cx, member, module, name, *argc, &mut stack, links, used, diags, i, op,
                ) else {
                    return None;
                };
                code.push(Instr::Call(idx));
            }
            Op::Ret => {
                if i != last {
                    diags.push(
                        Diagnostic::error(DiagCode::E1004)
                            .with_message("`ret` must be the final op of the body")
                            .at_member(cx.unit.clone(), member),
                    );
                    return None;
                }
                if let Some(expected) = ret {
                    let Some(top) = stack.pop() else {
                        diags.push(underflow(cx.unit, member, i, op));
                        return None;
                    };
                    if top != expected {
                        diags.push(
                            TypeMismatchConfig {
                                unit: cx.unit.clone(),
                                member,
                                expected: expected.name(),
                                found: top.name(),
                                context: "return value",
                            }
                            .into_diagnostic(),
                        );
                        return None;
                    }
                }
                if !stack.is_empty() {
                    diags.push(
                        Diagnostic::error(DiagCode::E1003)
                            .with_message(format!(
                                "operand stack holds {} leftover value(s) at `ret`",
                                stack.len()
                            ))
                            .at_member(cx.unit.clone(), member),
                    );
                    return None;
                }
                code.push(Instr::Ret);
            }
        }
    }

    Some(code)
}

#[allow(clippy::too_many_arguments, reason = "internal helper; a config struct would just restate the call site")]
fn lower_call(
    cx: &LowerCx<'_>,
    member: &str,
    module: &RefId,
    name: &str,
    argc: u8,
    stack: &mut Vec<ScalarType>,
    links: &mut Vec<LinkedCall>,
    used: &mut BTreeSet<RefId>,
    diags: &mut Vec<Diagnostic>,
    op_index: usize,
    op: &Op,
) -> Option<u32> {
    if !cx.references.contains(module) {
        diags.push(unregistered_reference(
            cx.unit.clone(),
            member,
            module.as_str(),
        ));
        return None;
    }
    let Some(builtin_module) = cx.registry.module(module) else {
        diags.push(unknown_module(cx.unit.clone(), member, module.as_str()));
        return None;
    };
    let Some(builtin) = builtin_module.lookup(name) else {
        diags.push(unknown_builtin(
            cx.unit.clone(),
            member,
            module.as_str(),
            name,
        ));
        return None;
    };
    if usize::from(argc) != builtin.params.len() {
        diags.push(
            Diagnostic::error(DiagCode::E2004)
                .with_message(format!(
                    "call passes {argc} argument(s), `{module}.{name}` takes {}",
                    builtin.params.len()
                ))
                .at_member(cx.unit.clone(), member),
        );
        return None;
    }

    // Arguments sit on the stack with the last one on top.
    for param_index in (0..builtin.params.len()).rev() {
        let Some(top) = stack.pop() else {
            diags.push(underflow(cx.unit, member, op_index, op));
            return None;
        };
        if top != builtin.params[param_index] {
            diags.push(
                TypeMismatchConfig {
                    unit: cx.unit.clone(),
                    member,
                    expected: builtin.params[param_index].name(),
                    found: top.name(),
                    context: &format!("argument {param_index} of `{module}.{name}`"),
                }
                .into_diagnostic(),
            );
            return None;
        }
    }
    used.insert(module.clone());
    stack.push(builtin.ret);

    let link = LinkedCall {
        module: module.clone(),
        name: name.to_owned(),
        argc,
    };
    let pos = match links.iter().position(|l| *l == link) {
        Some(pos) => pos,
        None => {
            links.push(link);
            links.len() - 1
        }
    };
    let Ok(idx) = u32::try_from(pos) else {
        diags.push(
            Diagnostic::error(DiagCode::E9001)
                .with_message("link table limit exceeded")
                .at_member(cx.unit.clone(), member),
        );
        return None;
    };
    Some(idx)
}

fn underflow(unit: &TypeName, member: &str, index: usize, op: &Op) -> Diagnostic {
    Diagnostic::error(DiagCode::E1002)
        .with_message(format!("operand stack underflow at op {index} (`{op}`)"))
        .at_member(unit.clone(), member)
}

fn intern_const(pool: &mut Vec<Value>, value: &Value) -> Option<u32> {
    if let Some(pos) = pool.iter().position(|p| p == value) {
        return u32::try_from(pos).ok();
    }
    pool.push(value.clone());
    u32::try_from(pool.len() - 1).ok()
}
