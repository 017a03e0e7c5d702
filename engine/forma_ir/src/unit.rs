//! The evolving definition of one synthesized type.
//!
//! Templates grow the [`TypeUnit`] member by member; the unit preserves
//! declaration order across member kinds because slot layout and constructor
//! ordinals are derived from it. Duplicate names are rejected at declaration
//! time so a pipeline fails on the template that caused the clash, not later
//! inside the compiler.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::name::{ContractId, TypeName};
use crate::ops::Op;
use crate::value::{ScalarType, Value};

/// A declaration the unit cannot accept.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DefError {
    #[error("member `{name}` is already declared on `{unit}`")]
    DuplicateMember { unit: TypeName, name: String },

    #[error("base contract `{base}` is already declared on `{unit}`")]
    DuplicateBase { unit: TypeName, base: ContractId },

    #[error("method `{member}` on `{unit}` has an empty body")]
    EmptyBody { unit: TypeName, member: String },

    #[error("default for field `{name}` is a {found}, but the field is declared {declared}")]
    DefaultTypeMismatch {
        name: String,
        declared: ScalarType,
        found: ScalarType,
    },
}

/// An instance field: one value slot on every instance of the type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: ScalarType,
    pub default: Value,
}

impl FieldDef {
    /// A field initialized to its type's zero value.
    pub fn new(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: ty.default_value(),
        }
    }

    /// A field with a declared default, which must inhabit the declared type.
    pub fn with_default(
        name: impl Into<String>,
        ty: ScalarType,
        default: Value,
    ) -> Result<Self, DefError> {
        if !default.is_of(ty) {
            return Err(DefError::DefaultTypeMismatch {
                name: name.into(),
                declared: ty,
                found: default.scalar_type(),
            });
        }
        Ok(Self {
            name: name.into(),
            ty,
            default,
        })
    }
}

/// A property: a backing field plus synthesized accessors.
///
/// Lowering generates `get_<name>` / `set_<name>` methods for the enabled
/// flags; the backing field occupies a slot like any declared field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub field: FieldDef,
    pub get: bool,
    pub set: bool,
}

impl PropertyDef {
    pub fn new(field: FieldDef, get: bool, set: bool) -> Self {
        Self { field, get, set }
    }

    pub fn read_write(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(FieldDef::new(name, ty), true, true)
    }

    pub fn read_only(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(FieldDef::new(name, ty), true, false)
    }
}

/// A declared method: parameters, optional return type, op body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<ScalarType>,
    pub ret: Option<ScalarType>,
    pub body: Vec<Op>,
}

impl MethodDef {
    pub fn new(
        name: impl Into<String>,
        params: Vec<ScalarType>,
        ret: Option<ScalarType>,
        body: Vec<Op>,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
            body,
        }
    }
}

/// A declared constructor body, run after slots take their defaults.
///
/// An empty body is legal: the constructor then does nothing beyond the
/// default initialization every instance gets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CtorDef {
    pub params: Vec<ScalarType>,
    pub body: Vec<Op>,
}

impl CtorDef {
    pub fn new(params: Vec<ScalarType>, body: Vec<Op>) -> Self {
        Self { params, body }
    }
}

/// Which namespace entry a declared member name belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MemberKind {
    Field,
    Property,
    Method,
}

/// The mutable definition of one synthesized type.
///
/// Fields, properties, and methods share a single name namespace. Declared
/// constructors are unnamed and ordered; ordinal 0 is reserved for the
/// implicit "all slots to declared defaults" constructor every compiled
/// type has, so the first declared constructor is ordinal 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeUnit {
    name: TypeName,
    bases: Vec<ContractId>,
    fields: Vec<FieldDef>,
    properties: Vec<PropertyDef>,
    methods: Vec<MethodDef>,
    ctors: Vec<CtorDef>,
    declared: Vec<(MemberKind, String)>,
}

impl TypeUnit {
    pub fn new(name: TypeName) -> Self {
        Self {
            name,
            bases: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            ctors: Vec::new(),
            declared: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &TypeName {
        &self.name
    }

    #[must_use]
    pub fn bases(&self) -> &[ContractId] {
        &self.bases
    }

    #[must_use]
    pub fn has_base(&self, base: &ContractId) -> bool {
        self.bases.contains(base)
    }

    /// Declare that this type fulfils `base`. Each contract at most once.
    pub fn add_base(&mut self, base: ContractId) -> Result<(), DefError> {
        if self.has_base(&base) {
            return Err(DefError::DuplicateBase {
                unit: self.name.clone(),
                base,
            });
        }
        self.bases.push(base);
        Ok(())
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    #[must_use]
    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    #[must_use]
    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    #[must_use]
    pub fn ctors(&self) -> &[CtorDef] {
        &self.ctors
    }

    /// Declared member names in declaration order, all kinds interleaved.
    #[must_use]
    pub fn declared_members(&self) -> &[(MemberKind, String)] {
        &self.declared
    }

    /// True if any field, property, or method claims `name`.
    #[must_use]
    pub fn has_member(&self, name: &str) -> bool {
        self.declared.iter().any(|(_, n)| n == name)
    }

    pub fn add_field(&mut self, field: FieldDef) -> Result<(), DefError> {
        self.claim(MemberKind::Field, &field.name)?;
        self.fields.push(field);
        Ok(())
    }

    pub fn add_property(&mut self, property: PropertyDef) -> Result<(), DefError> {
        self.claim(MemberKind::Property, &property.field.name)?;
        self.properties.push(property);
        Ok(())
    }

    pub fn add_method(&mut self, method: MethodDef) -> Result<(), DefError> {
        if method.body.is_empty() {
            return Err(DefError::EmptyBody {
                unit: self.name.clone(),
                member: method.name,
            });
        }
        self.claim(MemberKind::Method, &method.name)?;
        self.methods.push(method);
        Ok(())
    }

    /// Append a constructor and return the ordinal it will have on the
    /// compiled type. Ordinal 0 is the implicit defaults constructor.
    pub fn add_ctor(&mut self, ctor: CtorDef) -> usize {
        self.ctors.push(ctor);
        self.ctors.len()
    }

    /// Value slots in declaration order: declared fields and property
    /// backing fields, interleaved as the templates declared them.
    pub fn slot_fields(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.declared.iter().filter_map(|(kind, name)| match kind {
            MemberKind::Field => self.fields.iter().find(|f| f.name == *name),
            MemberKind::Property => self
                .properties
                .iter()
                .find(|p| p.field.name == *name)
                .map(|p| &p.field),
            MemberKind::Method => None,
        })
    }

    /// Look up a value slot by name, whether declared directly or as a
    /// property backing field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.slot_fields().find(|f| f.name == name)
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    fn claim(&mut self, kind: MemberKind, name: &str) -> Result<(), DefError> {
        if self.has_member(name) {
            return Err(DefError::DuplicateMember {
                unit: self.name.clone(),
                name: name.to_owned(),
            });
        }
        self.declared.push((kind, name.to_owned()));
        Ok(())
    }
}

impl fmt::Display for TypeUnit {
    /// Human-readable listing, one declaration per line. Written by the
    /// artifact dump feature; stable enough to grep but not a wire format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "unit {}", self.name)?;
        for base in &self.bases {
            writeln!(f, "  base {base}")?;
        }
        for (kind, name) in &self.declared {
            match kind {
                MemberKind::Field => {
                    if let Some(field) = self.fields.iter().find(|fd| fd.name == *name) {
                        writeln!(f, "  field {}: {} = {}", field.name, field.ty, field.default)?;
                    }
                }
                MemberKind::Property => {
                    if let Some(p) = self.properties.iter().find(|p| p.field.name == *name) {
                        let acc = match (p.get, p.set) {
                            (true, true) => "get set",
                            (true, false) => "get",
                            (false, true) => "set",
                            (false, false) => "",
                        };
                        writeln!(
                            f,
                            "  property {}: {} {{ {acc} }} = {}",
                            p.field.name, p.field.ty, p.field.default
                        )?;
                    }
                }
                MemberKind::Method => {
                    if let Some(m) = self.methods.iter().find(|m| m.name == *name) {
                        write!(f, "  method {}(", m.name)?;
                        for (i, param) in m.params.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{param}")?;
                        }
                        write!(f, ")")?;
                        if let Some(ret) = m.ret {
                            write!(f, " -> {ret}")?;
                        }
                        writeln!(f)?;
                        for op in &m.body {
                            writeln!(f, "    {op}")?;
                        }
                    }
                }
            }
        }
        writeln!(f, "  ctor 0 ()")?;
        for (i, ctor) in self.ctors.iter().enumerate() {
            write!(f, "  ctor {} (", i + 1)?;
            for (j, param) in ctor.params.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{param}")?;
            }
            writeln!(f, ")")?;
            for op in &ctor.body {
                writeln!(f, "    {op}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn unit() -> TypeUnit {
        TypeUnit::new(TypeName::from("Point"))
    }

    #[test]
    fn declaration_order_survives_kind_interleaving() {
        let mut u = unit();
        u.add_field(FieldDef::new("x", ScalarType::Int)).unwrap();
        u.add_property(PropertyDef::read_write("label", ScalarType::Str))
            .unwrap();
        u.add_field(FieldDef::new("y", ScalarType::Int)).unwrap();

        let slots: Vec<&str> = u.slot_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(slots, vec!["x", "label", "y"]);
    }

    #[test]
    fn member_namespace_is_shared_across_kinds() {
        let mut u = unit();
        u.add_field(FieldDef::new("value", ScalarType::Int)).unwrap();

        let err = u
            .add_property(PropertyDef::read_write("value", ScalarType::Int))
            .unwrap_err();
        assert!(matches!(err, DefError::DuplicateMember { name, .. } if name == "value"));
        // The rejected declaration must not leak into the order.
        assert_eq!(u.declared_members().len(), 1);
    }

    #[test]
    fn duplicate_base_is_rejected() {
        let mut u = unit();
        u.add_base(ContractId::from("app.Printable")).unwrap();
        assert!(u.has_base(&ContractId::from("app.Printable")));

        let err = u.add_base(ContractId::from("app.Printable")).unwrap_err();
        assert!(matches!(err, DefError::DuplicateBase { .. }));
    }

    #[test]
    fn field_default_must_match_declared_type() {
        let err = FieldDef::with_default("x", ScalarType::Int, Value::from(true)).unwrap_err();
        assert!(matches!(
            err,
            DefError::DefaultTypeMismatch {
                declared: ScalarType::Int,
                found: ScalarType::Bool,
                ..
            }
        ));
    }

    #[test]
    fn empty_method_body_is_rejected() {
        let mut u = unit();
        let err = u
            .add_method(MethodDef::new("noop", vec![], None, vec![]))
            .unwrap_err();
        assert!(matches!(err, DefError::EmptyBody { member, .. } if member == "noop"));
    }

    #[test]
    fn declared_ctor_ordinals_start_after_the_implicit_default() {
        let mut u = unit();
        assert_eq!(u.add_ctor(CtorDef::new(vec![], vec![])), 1);
        assert_eq!(
            u.add_ctor(CtorDef::new(vec![ScalarType::Int], vec![Op::Ret])),
            2
        );
    }

    #[test]
    fn display_lists_members_in_order() {
        let mut u = unit();
        u.add_field(FieldDef::new("x", ScalarType::Int)).unwrap();
        u.add_method(MethodDef::new(
            "get_x",
            vec![],
            Some(ScalarType::Int),
            vec![Op::LoadField("x".to_owned()), Op::Ret],
        ))
        .unwrap();

        let text = u.to_string();
        assert!(text.starts_with("unit Point\n"));
        assert!(text.contains("  field x: int = 0\n"));
        assert!(text.contains("  method get_x() -> int\n"));
        assert!(text.contains("    load_field x\n"));
        assert!(text.contains("  ctor 0 ()\n"));
    }
}
