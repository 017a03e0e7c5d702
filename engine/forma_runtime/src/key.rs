//! Synthesis keys: the identity of one requested type.

use std::fmt;

use forma_ir::{ContractId, TypeName};

/// Identifies one logical type request.
///
/// Structurally equal keys resolve to the same cached compiled type for the
/// lifetime of a library. A key renders deterministically into the emitted
/// type's name, so equal keys name the same type and differing keys name
/// differing ones.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TypeKey {
    contract: ContractId,
    discriminator: Option<String>,
}

impl TypeKey {
    pub fn new(contract: impl Into<ContractId>) -> Self {
        Self {
            contract: contract.into(),
            discriminator: None,
        }
    }

    /// A key for one variant of a contract, e.g. a per-tenant or per-schema
    /// specialization. Variants of the same contract are distinct types.
    pub fn with_discriminator(
        contract: impl Into<ContractId>,
        discriminator: impl Into<String>,
    ) -> Self {
        Self {
            contract: contract.into(),
            discriminator: Some(discriminator.into()),
        }
    }

    #[must_use]
    pub fn contract(&self) -> &ContractId {
        &self.contract
    }

    #[must_use]
    pub fn discriminator(&self) -> Option<&str> {
        self.discriminator.as_deref()
    }

    /// The name the emitted type will carry: the contract, plus
    /// `/discriminator` when present. Contracts are dotted paths by
    /// convention, so the `/` separator keeps variant names out of the
    /// undecorated namespace.
    #[must_use]
    pub fn type_name(&self) -> TypeName {
        TypeName::new(self.to_string())
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.discriminator {
            Some(discriminator) => write!(f, "{}/{discriminator}", self.contract),
            None => write!(f, "{}", self.contract),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn equal_keys_render_the_same_name() {
        let a = TypeKey::with_discriminator("app.Audit", "v2");
        let b = TypeKey::with_discriminator("app.Audit", "v2");
        assert_eq!(a, b);
        assert_eq!(a.type_name(), b.type_name());
        assert_eq!(a.type_name().as_str(), "app.Audit/v2");
    }

    #[test]
    fn discriminators_split_the_namespace() {
        let plain = TypeKey::new("app.Audit");
        let variant = TypeKey::with_discriminator("app.Audit", "v2");
        assert_ne!(plain, variant);
        assert_ne!(plain.type_name(), variant.type_name());
        assert_eq!(plain.type_name().as_str(), "app.Audit");
    }

    #[test]
    fn keys_order_by_contract_then_discriminator() {
        let mut keys = vec![
            TypeKey::with_discriminator("app.Audit", "v2"),
            TypeKey::new("app.Audit"),
            TypeKey::new("app.Alarm"),
        ];
        keys.sort();
        assert_eq!(keys[0].contract().as_str(), "app.Alarm");
        assert_eq!(keys[1].discriminator(), None);
        assert_eq!(keys[2].discriminator(), Some("v2"));
    }
}
