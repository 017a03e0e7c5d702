//! Builtin capability modules: the semantics behind reference identifiers.
//!
//! A reference identifier like `std.time` only means something because a
//! registry maps it to a module of typed functions. Lowering links calls
//! against the registry; module load verifies every linked function is still
//! provided; the interpreter dispatches through it.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use forma_ir::{RefId, ScalarType, Value};
use rustc_hash::FxHashMap;

/// Implementation of one builtin function.
///
/// Receives exactly the arguments the signature declares; lowering and load
/// verification enforce that, so implementations return `None` only for the
/// argument shapes they were never linked for.
pub type BuiltinImpl = fn(&[Value]) -> Option<Value>;

/// One typed builtin function.
#[derive(Debug)]
pub struct BuiltinFn {
    pub name: &'static str,
    pub params: &'static [ScalarType],
    pub ret: ScalarType,
    run: BuiltinImpl,
}

impl BuiltinFn {
    pub fn invoke(&self, args: &[Value]) -> Value {
        (self.run)(args).unwrap_or_else(|| self.ret.default_value())
    }
}

/// A named group of builtin functions behind one reference identifier.
#[derive(Debug)]
pub struct BuiltinModule {
    id: RefId,
    fns: Vec<BuiltinFn>,
}

impl BuiltinModule {
    pub fn new(id: RefId) -> Self {
        Self { id, fns: Vec::new() }
    }

    #[must_use]
    pub fn with_fn(
        mut self,
        name: &'static str,
        params: &'static [ScalarType],
        ret: ScalarType,
        run: BuiltinImpl,
    ) -> Self {
        self.fns.push(BuiltinFn {
            name,
            params,
            ret,
            run,
        });
        self
    }

    #[must_use]
    pub fn id(&self) -> &RefId {
        &self.id
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&BuiltinFn> {
        self.fns.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn fns(&self) -> &[BuiltinFn] {
        &self.fns
    }
}

/// All capability modules a backend (and later the loading runtime) provides.
#[derive(Debug)]
pub struct BuiltinRegistry {
    modules: FxHashMap<RefId, BuiltinModule>,
}

impl BuiltinRegistry {
    /// A registry with no modules. Useful when a caller wants full control
    /// over what compiled units may reach.
    pub fn empty() -> Self {
        Self {
            modules: FxHashMap::default(),
        }
    }

    /// The standard modules: `std.text`, `std.math`, `std.time`.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.add(std_text());
        registry.add(std_math());
        registry.add(std_time());
        registry
    }

    pub fn add(&mut self, module: BuiltinModule) {
        self.modules.insert(module.id.clone(), module);
    }

    #[must_use]
    pub fn module(&self, id: &RefId) -> Option<&BuiltinModule> {
        self.modules.get(id)
    }

    #[must_use]
    pub fn lookup(&self, id: &RefId, name: &str) -> Option<&BuiltinFn> {
        self.modules.get(id).and_then(|m| m.lookup(name))
    }
}

const INT: ScalarType = ScalarType::Int;
const STR: ScalarType = ScalarType::Str;
const DUR: ScalarType = ScalarType::Duration;

fn std_text() -> BuiltinModule {
    BuiltinModule::new(RefId::from("std.text"))
        .with_fn("concat", &[STR, STR], STR, text_concat)
        .with_fn("len", &[STR], INT, text_len)
        .with_fn("upper", &[STR], STR, text_upper)
}

fn std_math() -> BuiltinModule {
    BuiltinModule::new(RefId::from("std.math"))
        .with_fn("add", &[INT, INT], INT, math_add)
        .with_fn("mul", &[INT, INT], INT, math_mul)
        .with_fn("max", &[INT, INT], INT, math_max)
}

fn std_time() -> BuiltinModule {
    BuiltinModule::new(RefId::from("std.time"))
        .with_fn("now_millis", &[], INT, time_now_millis)
        .with_fn("millis_of", &[DUR], INT, time_millis_of)
        .with_fn("from_millis", &[INT], DUR, time_from_millis)
}

fn text_concat(args: &[Value]) -> Option<Value> {
    match args {
        [Value::Str(a), Value::Str(b)] => Some(Value::Str(format!("{a}{b}"))),
        _ => None,
    }
}

fn text_len(args: &[Value]) -> Option<Value> {
    match args {
        [Value::Str(s)] => Some(Value::Int(i64::try_from(s.len()).unwrap_or(i64::MAX))),
        _ => None,
    }
}

fn text_upper(args: &[Value]) -> Option<Value> {
    match args {
        [Value::Str(s)] => Some(Value::Str(s.to_uppercase())),
        _ => None,
    }
}

fn math_add(args: &[Value]) -> Option<Value> {
    match args {
        [Value::Int(a), Value::Int(b)] => Some(Value::Int(a.wrapping_add(*b))),
        _ => None,
    }
}

fn math_mul(args: &[Value]) -> Option<Value> {
    match args {
        [Value::Int(a), Value::Int(b)] => Some(Value::Int(a.wrapping_mul(*b))),
        _ => None,
    }
}

fn math_max(args: &[Value]) -> Option<Value> {
    match args {
        [Value::Int(a), Value::Int(b)] => Some(Value::Int((*a).max(*b))),
        _ => None,
    }
}

fn time_now_millis(_args: &[Value]) -> Option<Value> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    Some(Value::Int(i64::try_from(millis).unwrap_or(i64::MAX)))
}

fn time_millis_of(args: &[Value]) -> Option<Value> {
    match args {
        [Value::Duration(d)] => Some(Value::Int(
            i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        )),
        _ => None,
    }
}

fn time_from_millis(args: &[Value]) -> Option<Value> {
    match args {
        [Value::Int(ms)] => Some(Value::Duration(Duration::from_millis(
            u64::try_from(*ms).unwrap_or(0),
        ))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn standard_registry_provides_the_well_known_modules() {
        let registry = BuiltinRegistry::standard();
        for id in ["std.text", "std.math", "std.time"] {
            assert!(registry.module(&RefId::from(id)).is_some(), "missing {id}");
        }
        assert!(registry.module(&RefId::from("std.net")).is_none());
    }

    #[test]
    fn invoke_dispatches_typed_arguments() {
        let registry = BuiltinRegistry::standard();
        let concat = registry
            .lookup(&RefId::from("std.text"), "concat")
            .unwrap();
        assert_eq!(
            concat.invoke(&[Value::from("for"), Value::from("ma")]),
            Value::from("forma")
        );

        let max = registry.lookup(&RefId::from("std.math"), "max").unwrap();
        assert_eq!(max.invoke(&[Value::Int(3), Value::Int(9)]), Value::Int(9));
    }

    #[test]
    fn duration_conversions_round_trip() {
        let registry = BuiltinRegistry::standard();
        let from = registry
            .lookup(&RefId::from("std.time"), "from_millis")
            .unwrap();
        let of = registry
            .lookup(&RefId::from("std.time"), "millis_of")
            .unwrap();
        let dur = from.invoke(&[Value::Int(1500)]);
        assert_eq!(of.invoke(&[dur]), Value::Int(1500));
    }
}
