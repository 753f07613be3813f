//! # Model Registry (§3)
//!
//! A [`Model`] maps fact type → role name → declared predecessor type. It is
//! the leaf component everything else depends on: the validator, runner,
//! planner, inverter, and authorization engine all resolve roles through it.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::fact::{FactType, RoleName};

/// Per-type map of role name → predecessor type.
#[derive(Debug, Clone, Default)]
pub struct Model {
    roles: HashMap<FactType, HashMap<RoleName, FactType>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a role on `fact_type` pointing at `predecessor_type`.
    /// Builder-style, chainable, matching the teacher's `Catalog::register_*`
    /// methods.
    pub fn role(
        mut self,
        fact_type: impl Into<FactType>,
        role: impl Into<RoleName>,
        predecessor_type: impl Into<FactType>,
    ) -> Self {
        self.roles
            .entry(fact_type.into())
            .or_default()
            .insert(role.into(), predecessor_type.into());
        self
    }

    pub fn has_type(&self, fact_type: &str) -> bool {
        self.roles.contains_key(fact_type)
    }

    pub fn predecessor_type(&self, fact_type: &str, role: &str) -> Option<&FactType> {
        self.roles.get(fact_type)?.get(role)
    }

    /// Resolve a role or raise `UnknownRole`/`UnknownType`. Used by contexts
    /// (e.g. authorization-rule construction) where a missing role is fatal
    /// rather than merely making a query unsatisfiable.
    pub fn require_role(&self, fact_type: &str, role: &str) -> CoreResult<&FactType> {
        let roles = self
            .roles
            .get(fact_type)
            .ok_or_else(|| CoreError::UnknownType(fact_type.to_string()))?;
        roles.get(role).ok_or_else(|| CoreError::UnknownRole {
            fact_type: fact_type.to_string(),
            role: role.to_string(),
        })
    }

    pub fn roles_of(&self, fact_type: &str) -> impl Iterator<Item = (&RoleName, &FactType)> {
        self.roles.get(fact_type).into_iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_role() {
        let model = Model::new().role("Employee", "office", "Office");
        assert_eq!(
            model.predecessor_type("Employee", "office"),
            Some(&"Office".to_string())
        );
    }

    #[test]
    fn require_role_fails_on_unknown_type() {
        let model = Model::new();
        assert!(model.require_role("Employee", "office").is_err());
    }

    #[test]
    fn require_role_fails_on_unknown_role() {
        let model = Model::new().role("Employee", "office", "Office");
        assert!(model.require_role("Employee", "manager").is_err());
    }
}
