//! End-to-end tests for lowering, loading, and running compiled units.

use std::collections::BTreeSet;
use std::sync::Arc;

use forma_diagnostic::DiagCode;
use forma_ir::{
    ContractId, CtorDef, FieldDef, MethodDef, Op, PropertyDef, RefId, ScalarType, TypeName,
    TypeUnit, Value,
};
use pretty_assertions::assert_eq;

use crate::{
    Artifact, BuiltinRegistry, CompileError, InProcessCompiler, LoadError, Module, RunError,
    UnitCompiler,
};

fn refs(ids: &[&str]) -> BTreeSet<RefId> {
    ids.iter().copied().map(RefId::from).collect()
}

fn compile(units: &[TypeUnit], references: &BTreeSet<RefId>) -> Result<Artifact, CompileError> {
    InProcessCompiler::new().compile(units, references)
}

fn load(artifact: &Artifact) -> Module {
    let module = Module::new(Arc::new(BuiltinRegistry::standard()));
    module.install(artifact).unwrap();
    module
}

fn error_codes(err: &CompileError) -> Vec<DiagCode> {
    err.diagnostics()
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.code)
        .collect()
}

/// A unit exercising most of the surface: a field, a property, a declared
/// method calling a builtin, and a one-argument constructor.
fn counter_unit() -> TypeUnit {
    let mut unit = TypeUnit::new(TypeName::from("Counter"));
    unit.add_base(ContractId::from("app.Countable")).unwrap();
    unit.add_field(FieldDef::new("count", ScalarType::Int)).unwrap();
    unit.add_property(PropertyDef::read_write("label", ScalarType::Str))
        .unwrap();
    unit.add_method(MethodDef::new(
        "bump",
        vec![ScalarType::Int],
        Some(ScalarType::Int),
        vec![
            Op::LoadField("count".into()),
            Op::LoadArg(0),
            Op::CallBuiltin {
                module: RefId::from("std.math"),
                name: "add".into(),
                argc: 2,
            },
            Op::StoreField("count".into()),
            Op::LoadField("count".into()),
            Op::Ret,
        ],
    ))
    .unwrap();
    unit.add_ctor(CtorDef::new(
        vec![ScalarType::Int],
        vec![Op::LoadArg(0), Op::StoreField("count".into()), Op::Ret],
    ));
    unit
}

#[test]
fn compile_load_instantiate_call() {
    let artifact = compile(&[counter_unit()], &refs(&["std.math"])).unwrap();
    assert!(artifact.warnings.is_empty());

    let module = load(&artifact);
    let handle = module.get(&TypeName::from("Counter")).unwrap();
    assert!(handle.has_base(&ContractId::from("app.Countable")));
    assert_eq!(handle.ctor_count(), 2);
    assert_eq!(handle.fields(), &["count".to_owned(), "label".to_owned()]);

    let mut instance = handle.instantiate(0, &[]).unwrap();
    assert_eq!(instance.get("count").unwrap(), &Value::Int(0));

    let result = instance.call("bump", &[Value::Int(5)]).unwrap();
    assert_eq!(result, Some(Value::Int(5)));
    let result = instance.call("bump", &[Value::Int(2)]).unwrap();
    assert_eq!(result, Some(Value::Int(7)));
    assert_eq!(instance.get("count").unwrap(), &Value::Int(7));
}

#[test]
fn declared_ctor_runs_after_defaults() {
    let artifact = compile(&[counter_unit()], &refs(&["std.math"])).unwrap();
    let module = load(&artifact);
    let handle = module.get(&TypeName::from("Counter")).unwrap();

    let instance = handle.instantiate(1, &[Value::Int(41)]).unwrap();
    assert_eq!(instance.get("count").unwrap(), &Value::Int(41));
    // Slots the ctor body never touched keep their declared defaults.
    assert_eq!(instance.get("label").unwrap(), &Value::Str(String::new()));
}

#[test]
fn ctor_argument_contract_is_checked() {
    let artifact = compile(&[counter_unit()], &refs(&["std.math"])).unwrap();
    let module = load(&artifact);
    let handle = module.get(&TypeName::from("Counter")).unwrap();

    let err = handle.instantiate(7, &[]).unwrap_err();
    assert!(matches!(
        err,
        RunError::CtorOutOfRange {
            index: 7,
            available: 2,
            ..
        }
    ));

    let err = handle.instantiate(1, &[]).unwrap_err();
    assert!(matches!(err, RunError::ArgCount { expected: 1, found: 0, .. }));

    let err = handle.instantiate(1, &[Value::from("nope")]).unwrap_err();
    assert!(matches!(
        err,
        RunError::ArgType {
            expected: ScalarType::Int,
            found: ScalarType::Str,
            ..
        }
    ));
}

#[test]
fn property_accessors_are_synthesized() {
    let mut unit = TypeUnit::new(TypeName::from("Box"));
    unit.add_property(PropertyDef::read_write("value", ScalarType::Int))
        .unwrap();

    let artifact = compile(&[unit], &refs(&[])).unwrap();
    let compiled = artifact.unit(&TypeName::from("Box")).unwrap();
    assert_eq!(
        compiled.members,
        vec!["value".to_owned(), "get_value".to_owned(), "set_value".to_owned()]
    );

    let module = load(&artifact);
    let handle = module.get(&TypeName::from("Box")).unwrap();
    let mut a = handle.instantiate(0, &[]).unwrap();
    let mut b = handle.instantiate(0, &[]).unwrap();

    assert_eq!(a.call("get_value", &[]).unwrap(), Some(Value::Int(0)));
    a.call("set_value", &[Value::Int(12)]).unwrap();
    assert_eq!(a.call("get_value", &[]).unwrap(), Some(Value::Int(12)));
    // Instances do not share slots.
    assert_eq!(b.call("get_value", &[]).unwrap(), Some(Value::Int(0)));
    b.call("set_value", &[Value::Int(3)]).unwrap();
    assert_eq!(a.call("get_value", &[]).unwrap(), Some(Value::Int(12)));
}

#[test]
fn read_only_property_gets_no_setter() {
    let mut unit = TypeUnit::new(TypeName::from("Ro"));
    unit.add_property(PropertyDef::read_only("value", ScalarType::Int))
        .unwrap();

    let artifact = compile(&[unit], &refs(&[])).unwrap();
    let module = load(&artifact);
    let handle = module.get(&TypeName::from("Ro")).unwrap();
    let mut instance = handle.instantiate(0, &[]).unwrap();

    assert_eq!(instance.call("get_value", &[]).unwrap(), Some(Value::Int(0)));
    let err = instance.call("set_value", &[Value::Int(1)]).unwrap_err();
    assert!(matches!(err, RunError::UnknownMethod { .. }));
}

#[test]
fn call_without_registered_reference_is_rejected() {
    let mut unit = TypeUnit::new(TypeName::from("Clock"));
    unit.add_method(MethodDef::new(
        "stamp",
        vec![],
        Some(ScalarType::Int),
        vec![
            Op::CallBuiltin {
                module: RefId::from("std.time"),
                name: "now_millis".into(),
                argc: 0,
            },
            Op::Ret,
        ],
    ))
    .unwrap();

    // Identical unit, no reference registered.
    let err = compile(&[unit.clone()], &refs(&[])).unwrap_err();
    assert_eq!(error_codes(&err), vec![DiagCode::E2001]);

    // With the reference the same unit compiles.
    compile(&[unit], &refs(&["std.time"])).unwrap();
}

#[test]
fn unknown_module_and_function_are_distinct_rejections() {
    let mut unit = TypeUnit::new(TypeName::from("A"));
    unit.add_method(MethodDef::new(
        "m",
        vec![],
        None,
        vec![
            Op::CallBuiltin {
                module: RefId::from("std.net"),
                name: "fetch".into(),
                argc: 0,
            },
            Op::Ret,
        ],
    ))
    .unwrap();
    let err = compile(&[unit], &refs(&["std.net"])).unwrap_err();
    assert_eq!(error_codes(&err), vec![DiagCode::E2002]);

    let mut unit = TypeUnit::new(TypeName::from("B"));
    unit.add_method(MethodDef::new(
        "m",
        vec![],
        Some(ScalarType::Str),
        vec![
            Op::CallBuiltin {
                module: RefId::from("std.text"),
                name: "reverse".into(),
                argc: 0,
            },
            Op::Ret,
        ],
    ))
    .unwrap();
    let err = compile(&[unit], &refs(&["std.text"])).unwrap_err();
    assert_eq!(error_codes(&err), vec![DiagCode::E2003]);
}

#[test]
fn unused_reference_warns_but_compiles() {
    let mut unit = TypeUnit::new(TypeName::from("Plain"));
    unit.add_field(FieldDef::new("x", ScalarType::Int)).unwrap();

    let artifact = compile(&[unit], &refs(&["std.math"])).unwrap();
    assert_eq!(artifact.warnings.len(), 1);
    assert_eq!(artifact.warnings[0].code, DiagCode::W1001);
}

#[test]
fn accessor_clash_is_rejected() {
    let mut unit = TypeUnit::new(TypeName::from("Clash"));
    unit.add_method(MethodDef::new(
        "get_value",
        vec![],
        Some(ScalarType::Int),
        vec![Op::Const(Value::Int(1)), Op::Ret],
    ))
    .unwrap();
    unit.add_property(PropertyDef::read_write("value", ScalarType::Int))
        .unwrap();

    let err = compile(&[unit], &refs(&[])).unwrap_err();
    assert_eq!(error_codes(&err), vec![DiagCode::E0001]);
}

#[test]
fn body_stack_discipline_is_enforced() {
    let cases: Vec<(Vec<Op>, Option<ScalarType>, DiagCode)> = vec![
        // Leftover value on a void body.
        (
            vec![Op::Const(Value::Int(1)), Op::Ret],
            None,
            DiagCode::E1003,
        ),
        // Store with nothing on the stack.
        (
            vec![Op::StoreField("x".into()), Op::Ret],
            None,
            DiagCode::E1002,
        ),
        // Returning the wrong type.
        (
            vec![Op::Const(Value::from("s")), Op::Ret],
            Some(ScalarType::Int),
            DiagCode::E1006,
        ),
        // No ret at all.
        (vec![Op::LoadField("x".into())], None, DiagCode::E1004),
        // Ret in the middle.
        (
            vec![Op::Ret, Op::LoadField("x".into()), Op::Ret],
            None,
            DiagCode::E1004,
        ),
        // Argument index past the parameter list.
        (vec![Op::LoadArg(3), Op::Ret], None, DiagCode::E1005),
        // Unknown field.
        (
            vec![Op::LoadField("nope".into()), Op::Ret],
            Some(ScalarType::Int),
            DiagCode::E1001,
        ),
    ];

    for (body, ret, expected) in cases {
        let mut unit = TypeUnit::new(TypeName::from("Bad"));
        unit.add_field(FieldDef::new("x", ScalarType::Int)).unwrap();
        unit.add_method(MethodDef::new("m", vec![], ret, body.clone()))
            .unwrap();
        let err = compile(&[unit], &refs(&[])).unwrap_err();
        assert_eq!(error_codes(&err), vec![expected], "body: {body:?}");
    }
}

#[test]
fn builtin_arity_mismatch_is_rejected() {
    let mut unit = TypeUnit::new(TypeName::from("A"));
    unit.add_method(MethodDef::new(
        "m",
        vec![],
        Some(ScalarType::Int),
        vec![
            Op::Const(Value::Int(1)),
            Op::CallBuiltin {
                module: RefId::from("std.math"),
                name: "add".into(),
                argc: 1,
            },
            Op::Ret,
        ],
    ))
    .unwrap();
    let err = compile(&[unit], &refs(&["std.math"])).unwrap_err();
    assert_eq!(error_codes(&err), vec![DiagCode::E2004]);
}

#[test]
fn one_diagnostic_per_broken_member() {
    let mut unit = TypeUnit::new(TypeName::from("Multi"));
    unit.add_method(MethodDef::new(
        "first",
        vec![],
        None,
        vec![Op::LoadField("nope".into()), Op::Ret],
    ))
    .unwrap();
    unit.add_method(MethodDef::new(
        "second",
        vec![],
        None,
        vec![Op::LoadArg(0), Op::Ret],
    ))
    .unwrap();

    let err = compile(&[unit], &refs(&[])).unwrap_err();
    assert_eq!(error_codes(&err), vec![DiagCode::E1001, DiagCode::E1005]);
}

#[test]
fn duplicate_unit_names_in_one_batch_are_rejected() {
    let a = TypeUnit::new(TypeName::from("Dup"));
    let b = TypeUnit::new(TypeName::from("Dup"));
    let err = compile(&[a, b], &refs(&[])).unwrap_err();
    assert_eq!(error_codes(&err), vec![DiagCode::E0002]);
}

#[test]
fn artifact_survives_the_byte_round_trip() {
    let artifact = compile(&[counter_unit()], &refs(&["std.math"])).unwrap();
    let bytes = artifact.to_bytes().unwrap();
    let decoded = Artifact::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, artifact);

    let module = load(&decoded);
    let mut instance = module
        .get(&TypeName::from("Counter"))
        .unwrap()
        .instantiate(0, &[])
        .unwrap();
    assert_eq!(instance.call("bump", &[Value::Int(1)]).unwrap(), Some(Value::Int(1)));
}

#[test]
fn load_requires_every_linked_capability() {
    let artifact = compile(&[counter_unit()], &refs(&["std.math"])).unwrap();
    let bare = Module::new(Arc::new(BuiltinRegistry::empty()));
    let err = bare.install(&artifact).unwrap_err();
    assert!(matches!(err, LoadError::MissingCapability { .. }));
    assert!(bare.is_empty());
}

#[test]
fn installing_the_same_type_twice_fails() {
    let artifact = compile(&[counter_unit()], &refs(&["std.math"])).unwrap();
    let module = load(&artifact);
    let err = module.install(&artifact).unwrap_err();
    assert!(matches!(err, LoadError::DuplicateType(name) if name == TypeName::from("Counter")));
    assert_eq!(module.len(), 1);
}

#[test]
fn direct_slot_writes_are_type_checked() {
    let artifact = compile(&[counter_unit()], &refs(&["std.math"])).unwrap();
    let module = load(&artifact);
    let mut instance = module
        .get(&TypeName::from("Counter"))
        .unwrap()
        .instantiate(0, &[])
        .unwrap();

    instance.set("count", Value::Int(9)).unwrap();
    assert_eq!(instance.get("count").unwrap(), &Value::Int(9));

    let err = instance.set("count", Value::from(true)).unwrap_err();
    assert!(matches!(err, RunError::FieldType { .. }));
    let err = instance.get("ghost").unwrap_err();
    assert!(matches!(err, RunError::UnknownField { .. }));
}
