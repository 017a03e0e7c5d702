//! The remote backend through a real wire: equivalence with in-process
//! compilation, diagnostics and warnings crossing intact, and retrying a
//! key from scratch once a dead endpoint comes alive.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use forma_diagnostic::DiagCode;
use forma_host::HostServer;
use forma_ir::{MethodDef, Op, PropertyDef, RefId};
use forma_runtime::{
    CompileError, EmitContext, HostEndpoint, HostOptions, RemoteCompiler, ScalarType, SynthError,
    Template, TemplateError, TypeKey, TypeLibrary, Value,
};
use pretty_assertions::assert_eq;

fn spawn_host() -> (HostEndpoint, thread::JoinHandle<()>) {
    forma_runtime::init_tracing();
    let server = HostServer::bind("127.0.0.1:0").unwrap();
    let endpoint = HostEndpoint::localhost(server.local_addr().port());
    let handle = thread::spawn(move || server.serve().unwrap());
    (endpoint, handle)
}

fn quick_options() -> HostOptions {
    HostOptions {
        startup_timeout: Duration::from_millis(300),
        poll_interval: Duration::from_millis(50),
        io_timeout: Duration::from_secs(2),
        ..HostOptions::default()
    }
}

fn shut_down(endpoint: &HostEndpoint, server: thread::JoinHandle<()>) {
    endpoint.ensure_down(&quick_options()).unwrap();
    server.join().unwrap();
}

/// A read-write gauge property plus a builtin-backed `double` method.
struct AddGauge;

impl Template for AddGauge {
    fn name(&self) -> &str {
        "add_gauge"
    }

    fn apply(&self, cx: &mut EmitContext) -> Result<(), TemplateError> {
        cx.ensure_reference(RefId::from("std.math"));
        let unit = cx.unit_mut();
        unit.add_property(PropertyDef::read_write("level", ScalarType::Int))?;
        unit.add_method(MethodDef::new(
            "double",
            vec![],
            Some(ScalarType::Int),
            vec![
                Op::LoadField("level".into()),
                Op::Const(Value::Int(2)),
                Op::CallBuiltin {
                    module: RefId::from("std.math"),
                    name: "mul".into(),
                    argc: 2,
                },
                Op::StoreField("level".into()),
                Op::LoadField("level".into()),
                Op::Ret,
            ],
        ))?;
        Ok(())
    }
}

#[test]
fn remote_and_in_process_types_are_equivalent() {
    let (endpoint, server) = spawn_host();

    let over_the_wire = TypeLibrary::remote(endpoint.clone());
    let local = TypeLibrary::in_process();
    let key = TypeKey::new("app.Gauge");

    for library in [&over_the_wire, &local] {
        let report = library
            .ensure_written(&key, |pipeline| {
                pipeline.push(AddGauge);
            })
            .unwrap();
        assert!(report.performed);
    }

    let remote_handle = over_the_wire.written(&key).unwrap();
    let local_handle = local.written(&key).unwrap();
    assert_eq!(remote_handle.name(), local_handle.name());
    assert_eq!(remote_handle.members(), local_handle.members());
    assert_eq!(remote_handle.fields(), local_handle.fields());
    assert_eq!(remote_handle.ctor_count(), local_handle.ctor_count());

    // Behavior matches too, not just shape.
    for library in [&over_the_wire, &local] {
        let mut gauge = library.create_instance(&key, 0, &[]).unwrap();
        gauge.call("set_level", &[Value::Int(21)]).unwrap();
        assert_eq!(gauge.call("double", &[]).unwrap(), Some(Value::Int(42)));
    }

    shut_down(&endpoint, server);
}

#[test]
fn rejections_cross_the_wire_as_diagnostics() {
    struct CallUnknownBuiltin;

    impl Template for CallUnknownBuiltin {
        fn name(&self) -> &str {
            "call_unknown_builtin"
        }

        fn apply(&self, cx: &mut EmitContext) -> Result<(), TemplateError> {
            cx.ensure_reference(RefId::from("std.math"));
            cx.unit_mut().add_method(MethodDef::new(
                "mystery",
                vec![],
                Some(ScalarType::Int),
                vec![
                    Op::CallBuiltin {
                        module: RefId::from("std.math"),
                        name: "no_such_fn".into(),
                        argc: 0,
                    },
                    Op::Ret,
                ],
            ))?;
            Ok(())
        }
    }

    let (endpoint, server) = spawn_host();
    let library = TypeLibrary::remote(endpoint.clone());
    let key = TypeKey::new("app.Mystery");

    let err = library
        .ensure_written(&key, |pipeline| {
            pipeline.push(CallUnknownBuiltin);
        })
        .unwrap_err();
    match &err {
        SynthError::Compile { diagnostics, .. } => {
            assert!(diagnostics.iter().any(|d| d.code == DiagCode::E2003));
        }
        other => panic!("expected a compile rejection, got {other}"),
    }
    assert!(!library.contains(&key));

    shut_down(&endpoint, server);
}

#[test]
fn warnings_cross_the_wire_and_cache_anyway() {
    struct RegisterUnusedRef;

    impl Template for RegisterUnusedRef {
        fn name(&self) -> &str {
            "register_unused_ref"
        }

        fn apply(&self, cx: &mut EmitContext) -> Result<(), TemplateError> {
            cx.ensure_reference(RefId::from("std.time"));
            cx.unit_mut()
                .add_property(PropertyDef::read_write("id", ScalarType::Int))?;
            Ok(())
        }
    }

    let (endpoint, server) = spawn_host();
    let library = TypeLibrary::remote(endpoint.clone());
    let key = TypeKey::new("app.WarnedRemote");

    let report = library
        .ensure_written(&key, |pipeline| {
            pipeline.push(RegisterUnusedRef);
        })
        .unwrap();
    assert!(report.performed);
    assert!(report.warnings.iter().any(|w| w.code == DiagCode::W1001));
    assert!(library.contains(&key));
    library.create_instance(&key, 0, &[]).unwrap();

    shut_down(&endpoint, server);
}

#[test]
fn dead_endpoint_fails_then_recovers_once_a_host_binds() {
    // Claim a port and release it so nothing answers there yet.
    let placeholder = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = placeholder.local_addr().unwrap().port();
    drop(placeholder);

    let endpoint = HostEndpoint::localhost(port);
    let library = TypeLibrary::new(Arc::new(RemoteCompiler::with_options(
        endpoint.clone(),
        quick_options(),
    )));
    let key = TypeKey::new("app.Latecomer");

    let err = library
        .ensure_written(&key, |pipeline| {
            pipeline.push(AddGauge);
        })
        .unwrap_err();
    match &err {
        SynthError::Host { source, .. } => {
            assert!(matches!(source, CompileError::HostUnavailable { .. }));
        }
        other => panic!("expected a host failure, got {other}"),
    }
    assert!(!library.contains(&key));

    // Once a host serves the endpoint, the same key writes from scratch.
    let server = HostServer::bind(&endpoint.addr()).unwrap();
    let handle = thread::spawn(move || server.serve().unwrap());

    let report = library
        .ensure_written(&key, |pipeline| {
            pipeline.push(AddGauge);
        })
        .unwrap();
    assert!(report.performed);
    assert!(library.contains(&key));

    shut_down(&endpoint, handle);
}
