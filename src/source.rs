//! # FactSource (read-side external interface, §6.1)
//!
//! The Runner interprets a [`crate::specification::Specification`] purely in
//! terms of this trait. Every method is async: the core expects a
//! cooperative scheduler with a suspension point at each call (§5). Concrete
//! implementations (in-memory, relational) are external collaborators and
//! out of scope for this core; only the contract lives here.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::fact::{Fact, FactReference, FactType, RoleName};

/// The projected shape of a hydrated fact: its fields plus type/hash,
/// suitable for a `SingularProjection::Field`/`Fact`/`Hash` read.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectedFact {
    pub reference: FactReference,
    pub fields: std::collections::BTreeMap<String, serde_json::Value>,
}

#[async_trait]
pub trait FactSource: Send + Sync {
    /// Look up a fact by reference. `Ok(None)` means the source legitimately
    /// doesn't have it (distinct from a transport failure).
    async fn find_fact(&self, reference: &FactReference) -> CoreResult<Option<Fact>>;

    /// Predecessors of `reference` for `role_name`, filtered to
    /// `predecessor_type` (§3: a role's predecessor type is fixed by the
    /// Model).
    async fn get_predecessors(
        &self,
        reference: &FactReference,
        role_name: &RoleName,
        predecessor_type: &FactType,
    ) -> CoreResult<Vec<FactReference>>;

    /// Successors of `reference` reachable via `role_name`, filtered to
    /// `successor_type` (the type of the fact that *declares* the role).
    async fn get_successors(
        &self,
        reference: &FactReference,
        role_name: &RoleName,
        successor_type: &FactType,
    ) -> CoreResult<Vec<FactReference>>;

    /// Produce the projection shape for a fact.
    async fn hydrate(&self, reference: &FactReference) -> CoreResult<ProjectedFact>;
}

/// A small in-memory `FactSource` over a fixed fact set, computing
/// predecessors/successors by scanning. Used for the authorization engine's
/// in-memory "submitted fact graph" run (§4.6) and as a shared test fixture.
#[derive(Default, Clone)]
pub struct InMemoryGraph {
    facts: std::collections::BTreeMap<FactReference, Fact>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `fact` (and implicitly make it and its already-inserted
    /// predecessors reachable); returns its reference.
    pub fn insert(&mut self, fact: Fact) -> FactReference {
        let reference = fact.reference();
        self.facts.insert(reference.clone(), fact);
        reference
    }

    /// Build a graph from a fact plus every predecessor transitively
    /// reachable from the already-known set `known` (§4.6: "the new fact
    /// plus its transitively included predecessors").
    pub fn from_submission(candidate: Fact, known: &[Fact]) -> Self {
        let mut graph = Self::new();
        for f in known {
            graph.insert(f.clone());
        }
        graph.insert(candidate);
        graph
    }
}

#[async_trait]
impl FactSource for InMemoryGraph {
    async fn find_fact(&self, reference: &FactReference) -> CoreResult<Option<Fact>> {
        Ok(self.facts.get(reference).cloned())
    }

    async fn get_predecessors(
        &self,
        reference: &FactReference,
        role_name: &RoleName,
        predecessor_type: &FactType,
    ) -> CoreResult<Vec<FactReference>> {
        let Some(fact) = self.facts.get(reference) else {
            return Ok(Vec::new());
        };
        Ok(fact
            .predecessors_for(role_name)
            .into_iter()
            .filter(|r| &r.fact_type == predecessor_type)
            .collect())
    }

    async fn get_successors(
        &self,
        reference: &FactReference,
        role_name: &RoleName,
        successor_type: &FactType,
    ) -> CoreResult<Vec<FactReference>> {
        Ok(self
            .facts
            .values()
            .filter(|f| &f.fact_type == successor_type)
            .filter(|f| f.predecessors_for(role_name).contains(reference))
            .map(|f| f.reference())
            .collect())
    }

    async fn hydrate(&self, reference: &FactReference) -> CoreResult<ProjectedFact> {
        let fact = self
            .facts
            .get(reference)
            .ok_or_else(|| crate::error::CoreError::UnknownFact(reference.clone()))?;
        Ok(ProjectedFact {
            reference: reference.clone(),
            fields: fact.fields.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::{new_fact, Predecessors};
    use std::collections::BTreeMap;

    #[test]
    fn from_submission_includes_candidate_and_known_predecessors() {
        let office = new_fact("Office", BTreeMap::new(), BTreeMap::new());
        let office_ref = office.reference();
        let mut preds = BTreeMap::new();
        preds.insert("office".to_string(), Predecessors::Single(office_ref.clone()));
        let employee = new_fact("Employee", BTreeMap::new(), preds);

        let graph = InMemoryGraph::from_submission(employee.clone(), &[office]);
        assert!(graph.facts.contains_key(&office_ref));
        assert!(graph.facts.contains_key(&employee.reference()));
    }
}
