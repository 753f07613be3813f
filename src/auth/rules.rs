//! Per-type authorization rules (§4.6).

use std::collections::HashMap;

use crate::fact::FactType;
use crate::specification::Specification;

/// One rule for a fact type. `Specification`'s given is the fact being
/// authorized; its projection must name a singular user/device fact.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthorizationRule {
    Any,
    None,
    Specification(Specification),
}

/// Per-type rule sets, ORed when more than one rule applies to a type.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationRules {
    rules: HashMap<FactType, Vec<AuthorizationRule>>,
}

impl AuthorizationRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn any(mut self, fact_type: impl Into<FactType>) -> Self {
        self.rules.entry(fact_type.into()).or_default().push(AuthorizationRule::Any);
        self
    }

    pub fn none(mut self, fact_type: impl Into<FactType>) -> Self {
        self.rules.entry(fact_type.into()).or_default().push(AuthorizationRule::None);
        self
    }

    pub fn specification(mut self, fact_type: impl Into<FactType>, spec: Specification) -> Self {
        self.rules
            .entry(fact_type.into())
            .or_default()
            .push(AuthorizationRule::Specification(spec));
        self
    }

    pub fn rules_for(&self, fact_type: &str) -> &[AuthorizationRule] {
        self.rules.get(fact_type).map(|v| v.as_slice()).unwrap_or(&[])
    }
}
