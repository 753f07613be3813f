//! # Specification Runner (§4.2)
//!
//! Interprets a [`Specification`] against a [`FactSource`]: predecessor and
//! successor walks, existential filters, and projection. The algorithm walks
//! strictly in source order so results are deterministic whenever the source
//! is (§5 ordering guarantees).

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::fact::{FactReference, Hash};
use crate::model::Model;
use crate::source::FactSource;

use super::{Component, Condition, Label, Match, Projection, Quantifier, Role, SingularProjection, Specification};

pub type Tuple = BTreeMap<Label, FactReference>;

/// A single projected value read off a label: a fact reference, a field, or
/// a hash.
#[derive(Clone, Debug, PartialEq)]
pub enum SingularValue {
    Fact(FactReference),
    Field(serde_json::Value),
    Hash(Hash),
}

/// The value of one named component inside a composite projection.
#[derive(Clone, Debug, PartialEq)]
pub enum ComponentValue {
    Singular(SingularValue),
    /// The result of a nested specification-projection: one sub-result per
    /// satisfying tuple, in source order.
    Nested(Vec<ProjectedResult>),
}

/// The projection's computed value.
#[derive(Clone, Debug, PartialEq)]
pub enum ProjectedValue {
    Singular(SingularValue),
    Composite(Vec<(String, ComponentValue)>),
}

/// One result row: the tuple of bindings that produced it, plus the
/// projected value.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectedResult {
    pub tuple: Tuple,
    pub value: ProjectedValue,
}

/// Walk `roles` as predecessor steps starting at `start`, fanning out at
/// each hop (a role may be collection-valued).
async fn walk_predecessors<S: FactSource + ?Sized>(
    source: &S,
    start: FactReference,
    roles: &[Role],
) -> CoreResult<Vec<FactReference>> {
    let mut current = vec![start];
    for role in roles {
        let mut next = Vec::new();
        for r in &current {
            let preds = source
                .get_predecessors(r, &role.name, &role.predecessor_type)
                .await?;
            next.extend(preds);
        }
        current = next;
    }
    Ok(current)
}

/// Walk `roles` (given in the same `unknown -> ... -> boundary` order as
/// `roles_left`) in reverse, as successor steps, starting at `starts`
/// (already at the boundary type) and finishing at `final_type`.
async fn walk_successors_reverse<S: FactSource + ?Sized>(
    source: &S,
    starts: Vec<FactReference>,
    roles: &[Role],
    final_type: &str,
) -> CoreResult<Vec<FactReference>> {
    let mut current = starts;
    for i in (0..roles.len()).rev() {
        let successor_type = if i == 0 {
            final_type
        } else {
            roles[i - 1].predecessor_type.as_str()
        };
        let mut next = Vec::new();
        for r in &current {
            let succs = source
                .get_successors(r, &roles[i].name, &successor_type.to_string())
                .await?;
            next.extend(succs);
        }
        current = next;
    }
    Ok(current)
}

/// Evaluate both sides of a `Path` condition with a known `label_right` and
/// return the boundary reference set (predecessor walk only).
async fn boundary_refs<S: FactSource + ?Sized>(
    source: &S,
    tuple: &Tuple,
    label_right: &Label,
    roles_right: &[Role],
) -> CoreResult<Vec<FactReference>> {
    let start = tuple
        .get(label_right)
        .cloned()
        .ok_or_else(|| CoreError::MalformedSpecification(format!("label '{label_right}' not bound")))?;
    walk_predecessors(source, start, roles_right).await
}

/// Bind a match's unknown: evaluate its first (binding) `Path` condition and
/// return the candidate fact references.
async fn bind_unknown<S: FactSource + ?Sized>(
    source: &S,
    tuple: &Tuple,
    unknown_type: &str,
    roles_left: &[Role],
    label_right: &Label,
    roles_right: &[Role],
) -> CoreResult<Vec<FactReference>> {
    let boundary = boundary_refs(source, tuple, label_right, roles_right).await?;
    if roles_left.is_empty() {
        Ok(boundary)
    } else {
        walk_successors_reverse(source, boundary, roles_left, unknown_type).await
    }
}

/// Evaluate a filter `Path` condition against an already-fully-bound tuple:
/// true iff the two predecessor walks share at least one reference.
async fn eval_path_filter<S: FactSource + ?Sized>(
    source: &S,
    tuple: &Tuple,
    current_unknown: &Label,
    roles_left: &[Role],
    label_right: &Label,
    roles_right: &[Role],
) -> CoreResult<bool> {
    let unknown_ref = tuple
        .get(current_unknown)
        .cloned()
        .ok_or_else(|| CoreError::MalformedSpecification(format!("label '{current_unknown}' not bound")))?;
    let left = walk_predecessors(source, unknown_ref, roles_left).await?;
    let right = boundary_refs(source, tuple, label_right, roles_right).await?;
    Ok(left.iter().any(|l| right.contains(l)))
}

/// Evaluate a single condition (after the binding one) against `tuple`,
/// where `scope_unknown` is the label the condition is implicitly about
/// (the match's own unknown, or the enclosing given).
fn eval_condition<'a, S: FactSource + ?Sized + 'a>(
    source: &'a S,
    model: &'a Model,
    tuple: &'a Tuple,
    scope_unknown: &'a Label,
    cond: &'a Condition,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = CoreResult<bool>> + 'a>> {
    Box::pin(async move {
        match cond {
            Condition::Path {
                roles_left,
                label_right,
                roles_right,
            } => eval_path_filter(source, tuple, scope_unknown, roles_left, label_right, roles_right).await,
            Condition::Existential { quantifier, matches } => {
                let sub_results = run_match_list(source, model, tuple.clone(), matches).await?;
                let non_empty = !sub_results.is_empty();
                Ok(match quantifier {
                    Quantifier::ExistsAll => non_empty,
                    Quantifier::NotExists => !non_empty,
                })
            }
        }
    })
}

/// Extend a list of tuples by one match, producing the cross product of
/// existing tuples with that match's satisfying candidates.
async fn extend_by_match<S: FactSource + ?Sized>(
    source: &S,
    model: &Model,
    tuples: Vec<Tuple>,
    m: &Match,
) -> CoreResult<Vec<Tuple>> {
    let first = m
        .conditions
        .first()
        .ok_or_else(|| CoreError::MalformedSpecification(format!("match '{}' has no conditions", m.unknown.name)))?;
    let Condition::Path {
        roles_left,
        label_right,
        roles_right,
    } = first
    else {
        return Err(CoreError::MalformedSpecification(format!(
            "match '{}' must begin with a Path condition",
            m.unknown.name
        )));
    };

    let mut out = Vec::new();
    for tuple in tuples {
        let candidates = bind_unknown(
            source,
            &tuple,
            &m.unknown.fact_type,
            roles_left,
            label_right,
            roles_right,
        )
        .await?;
        for candidate in candidates {
            let mut next = tuple.clone();
            next.insert(m.unknown.name.clone(), candidate);
            let mut accepted = true;
            for cond in &m.conditions[1..] {
                if !eval_condition(source, model, &next, &m.unknown.name, cond).await? {
                    accepted = false;
                    break;
                }
            }
            if accepted {
                out.push(next);
            }
        }
    }
    Ok(out)
}

async fn run_match_list<S: FactSource + ?Sized>(
    source: &S,
    model: &Model,
    seed: Tuple,
    matches: &[Match],
) -> CoreResult<Vec<Tuple>> {
    let mut tuples = vec![seed];
    for m in matches {
        tuples = extend_by_match(source, model, tuples, m).await?;
    }
    Ok(tuples)
}

async fn eval_given_conditions<S: FactSource + ?Sized>(
    source: &S,
    model: &Model,
    tuple: &Tuple,
    given_name: &Label,
    conditions: &[Condition],
) -> CoreResult<bool> {
    for cond in conditions {
        if !eval_condition(source, model, tuple, given_name, cond).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn singular_value(v: &SingularProjection, tuple: &Tuple, hydrated_field: Option<serde_json::Value>) -> CoreResult<SingularValue> {
    match v {
        SingularProjection::Fact(label) => tuple
            .get(label)
            .cloned()
            .map(SingularValue::Fact)
            .ok_or_else(|| CoreError::MalformedSpecification(format!("label '{label}' not bound"))),
        SingularProjection::Hash(label) => tuple
            .get(label)
            .map(|r| SingularValue::Hash(r.hash.clone()))
            .ok_or_else(|| CoreError::MalformedSpecification(format!("label '{label}' not bound"))),
        SingularProjection::Field(label, _field_name) => {
            let _ = tuple
                .get(label)
                .ok_or_else(|| CoreError::MalformedSpecification(format!("label '{label}' not bound")))?;
            Ok(SingularValue::Field(hydrated_field.unwrap_or(serde_json::Value::Null)))
        }
    }
}

async fn compute_singular<S: FactSource + ?Sized>(
    source: &S,
    tuple: &Tuple,
    proj: &SingularProjection,
) -> CoreResult<SingularValue> {
    let hydrated = if let SingularProjection::Field(label, field_name) = proj {
        let reference = tuple
            .get(label)
            .cloned()
            .ok_or_else(|| CoreError::MalformedSpecification(format!("label '{label}' not bound")))?;
        let hydrated = source.hydrate(&reference).await?;
        hydrated.fields.get(field_name).cloned()
    } else {
        None
    };
    singular_value(proj, tuple, hydrated)
}

fn compute_projection<'a, S: FactSource + ?Sized + 'a>(
    source: &'a S,
    model: &'a Model,
    tuple: &'a Tuple,
    projection: &'a Projection,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = CoreResult<ProjectedValue>> + 'a>> {
    Box::pin(async move {
        match projection {
            Projection::Singular(s) => Ok(ProjectedValue::Singular(compute_singular(source, tuple, s).await?)),
            Projection::Composite(components) => {
                let mut out = Vec::with_capacity(components.len());
                for nc in components {
                    let value = match &nc.component {
                        Component::Singular(s) => {
                            ComponentValue::Singular(compute_singular(source, tuple, s).await?)
                        }
                        Component::Specification(sp) => {
                            let sub_tuples = run_match_list(source, model, tuple.clone(), &sp.matches).await?;
                            let mut results = Vec::with_capacity(sub_tuples.len());
                            for t in sub_tuples {
                                let value = compute_projection(source, model, &t, &sp.projection).await?;
                                results.push(ProjectedResult { tuple: t, value });
                            }
                            ComponentValue::Nested(results)
                        }
                    };
                    out.push((nc.name.clone(), value));
                }
                Ok(ProjectedValue::Composite(out))
            }
        }
    })
}

/// Run `spec` against `source`, seeded with `start` (one fact reference per
/// given, in declared order).
pub async fn read<S: FactSource + ?Sized>(
    source: &S,
    model: &Model,
    spec: &Specification,
    start: &[(Label, FactReference)],
) -> CoreResult<Vec<ProjectedResult>> {
    let mut seed = Tuple::new();
    for (name, reference) in start {
        seed.insert(name.clone(), reference.clone());
    }

    for given in &spec.given {
        if !eval_given_conditions(source, model, &seed, &given.name, &given.conditions).await? {
            return Ok(Vec::new());
        }
    }

    let tuples = run_match_list(source, model, seed, &spec.matches).await?;
    let mut results = Vec::with_capacity(tuples.len());
    for tuple in tuples {
        let value = compute_projection(source, model, &tuple, &spec.projection).await?;
        results.push(ProjectedResult { tuple, value });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::fact::{new_fact, Fact, Predecessors};
    use crate::specification::builder::*;

    /// Minimal in-memory `FactSource` for exercising the runner against a
    /// small hand-built graph.
    #[derive(Default)]
    struct MemorySource {
        facts: Mutex<BTreeMap<FactReference, Fact>>,
    }

    impl MemorySource {
        fn insert(&self, fact: Fact) -> FactReference {
            let reference = fact.reference();
            self.facts.lock().unwrap().insert(reference.clone(), fact);
            reference
        }
    }

    #[async_trait]
    impl crate::source::FactSource for MemorySource {
        async fn find_fact(&self, reference: &FactReference) -> CoreResult<Option<Fact>> {
            Ok(self.facts.lock().unwrap().get(reference).cloned())
        }

        async fn get_predecessors(
            &self,
            reference: &FactReference,
            role_name: &RoleName,
            predecessor_type: &crate::fact::FactType,
        ) -> CoreResult<Vec<FactReference>> {
            let facts = self.facts.lock().unwrap();
            let Some(fact) = facts.get(reference) else {
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
            successor_type: &crate::fact::FactType,
        ) -> CoreResult<Vec<FactReference>> {
            let facts = self.facts.lock().unwrap();
            Ok(facts
                .values()
                .filter(|f| &f.fact_type == successor_type)
                .filter(|f| f.predecessors_for(role_name).contains(reference))
                .map(|f| f.reference())
                .collect())
        }

        async fn hydrate(&self, reference: &FactReference) -> CoreResult<crate::source::ProjectedFact> {
            let facts = self.facts.lock().unwrap();
            let fact = facts
                .get(reference)
                .ok_or_else(|| CoreError::UnknownFact(reference.clone()))?;
            Ok(crate::source::ProjectedFact {
                reference: reference.clone(),
                fields: fact.fields.clone(),
            })
        }
    }

    fn office(identifier: i64) -> Fact {
        let mut fields = BTreeMap::new();
        fields.insert("identifier".to_string(), serde_json::json!(identifier));
        new_fact("Office", fields, BTreeMap::new())
    }

    fn employee(office_ref: &FactReference, name: &str) -> Fact {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), serde_json::json!(name));
        let mut preds = BTreeMap::new();
        preds.insert("office".to_string(), Predecessors::Single(office_ref.clone()));
        new_fact("Employee", fields, preds)
    }

    #[tokio::test]
    async fn finds_employees_of_an_office() {
        let source = MemorySource::default();
        let office_ref = source.insert(office(1));
        let alice_ref = source.insert(employee(&office_ref, "Alice"));
        let _bob_ref = source.insert(employee(&office_ref, "Bob"));

        let model = Model::new().role("Employee", "office", "Office");
        let o = LabelRef::new("o");
        let spec = SpecificationBuilder::new()
            .given("o", "Office")
            .matching(
                "e",
                "Employee",
                vec![successor(vec![role("office", "Office")], &o)],
            )
            .project_fact("e");

        let results = read(&source, &model, &spec, &[("o".to_string(), office_ref)])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        let refs: Vec<FactReference> = results
            .iter()
            .map(|r| match &r.value {
                ProjectedValue::Singular(SingularValue::Fact(r)) => r.clone(),
                _ => panic!("expected a singular fact projection"),
            })
            .collect();
        assert!(refs.contains(&alice_ref));
    }

    #[tokio::test]
    async fn not_exists_filters_out_matching_candidates() {
        let source = MemorySource::default();
        let office_ref = source.insert(office(1));
        let alice_ref = source.insert(employee(&office_ref, "Alice"));

        let mut closed_preds = BTreeMap::new();
        closed_preds.insert(
            "office".to_string(),
            Predecessors::Single(office_ref.clone()),
        );
        let closed = new_fact("Office.Closed", BTreeMap::new(), closed_preds);
        let _closed_ref = source.insert(closed);

        let model = Model::new()
            .role("Employee", "office", "Office")
            .role("Office.Closed", "office", "Office");

        let o = LabelRef::new("o");
        let spec = SpecificationBuilder::new()
            .given("o", "Office")
            .matching(
                "e",
                "Employee",
                vec![successor(vec![role("office", "Office")], &o)],
            )
            .project_fact("e");

        // Control: without the not-exists condition the closed office's
        // employee still appears.
        let results = read(&source, &model, &spec, &[("o".to_string(), office_ref.clone())])
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            &results[0].value,
            ProjectedValue::Singular(SingularValue::Fact(r)) if r == &alice_ref
        ));

        let o2 = LabelRef::new("o");
        let spec_guarded = SpecificationBuilder::new()
            .given_where(
                "o",
                "Office",
                vec![not_exists(vec![one_match(
                    "c",
                    "Office.Closed",
                    vec![successor(vec![role("office", "Office")], &o2)],
                )])],
            )
            .matching(
                "e",
                "Employee",
                vec![successor(vec![role("office", "Office")], &o2)],
            )
            .project_fact("e");

        let results = read(&source, &model, &spec_guarded, &[("o".to_string(), office_ref)])
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
