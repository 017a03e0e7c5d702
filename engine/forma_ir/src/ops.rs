//! Body fragments: the op list a method or constructor body is made of.
//!
//! Bodies are data, never text. Each op manipulates a small operand stack;
//! the compiler checks balance and slot references at lowering time and the
//! artifact stores the checked list verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::name::RefId;
use crate::value::Value;

/// One step of a method or constructor body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Push a literal value.
    Const(Value),
    /// Push the current value of the named instance field.
    LoadField(String),
    /// Pop the stack top into the named instance field.
    StoreField(String),
    /// Push the caller-supplied argument at this position.
    LoadArg(u8),
    /// Pop `argc` arguments and push the result of calling a function from
    /// an external capability module. The module must have been registered
    /// as a reference before compilation.
    CallBuiltin { module: RefId, name: String, argc: u8 },
    /// Stop executing the body. For value-returning methods the stack top
    /// becomes the return value; otherwise the stack must be empty.
    Ret,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(v) => write!(f, "const {v}"),
            Self::LoadField(name) => write!(f, "load_field {name}"),
            Self::StoreField(name) => write!(f, "store_field {name}"),
            Self::LoadArg(index) => write!(f, "load_arg {index}"),
            Self::CallBuiltin { module, name, argc } => {
                write!(f, "call {module}.{name}/{argc}")
            }
            Self::Ret => f.write_str("ret"),
        }
    }
}
