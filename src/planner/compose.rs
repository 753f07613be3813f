//! Result composition (§4.3 "Result composition").
//!
//! A plan for a specification with nested specification-projections is a
//! *tree* of queries. This module never executes SQL; it composes the final
//! nested result shape from row sets a storage backend already fetched for
//! each node of that tree (mirrored here as [`FetchedRows`]), matching child
//! rows to their parent by comparing the correlated label values each child
//! carries as its leading output columns.

use std::collections::BTreeMap;

use crate::fact::FactReference;
use crate::specification::runner::{ComponentValue, ProjectedResult, ProjectedValue, SingularValue};
use crate::specification::{Component, Label, Projection, SingularProjection};

use super::{Parameter, PlannedQuery, QueryDescription};

/// One already-fetched row: the fact reference per output label, plus
/// whatever field data (`data_{label}`) the result query selected.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Row {
    pub facts: BTreeMap<Label, FactReference>,
    pub fields: BTreeMap<Label, serde_json::Value>,
}

/// Pre-fetched rows for one node of a `PlannedQuery` tree, mirroring its
/// shape: one `Row` list for this node's own query, plus a fetched child per
/// named nested specification-projection.
#[derive(Clone, Debug, Default)]
pub struct FetchedRows {
    pub rows: Vec<Row>,
    pub children: Vec<(String, FetchedRows)>,
}

/// Labels a child query inherits from its enclosing query (its leading
/// correlated columns, per §4.3). Storage backends use this to know which
/// columns to sort/group a child query's rows by; composition itself
/// matches on every label the two row shapes share, which is equivalent
/// whenever the child's own labels don't happen to collide with unrelated
/// outer labels of the same name.
pub fn correlated_labels(query: &QueryDescription) -> Vec<Label> {
    query
        .inputs
        .iter()
        .filter_map(|input| match query.parameters.get(input.fact_type_parameter) {
            Some(Parameter::Correlated(label)) => Some(label.clone()),
            _ => None,
        })
        .collect()
}

fn singular_value(row: &Row, proj: &SingularProjection) -> SingularValue {
    match proj {
        SingularProjection::Fact(label) => SingularValue::Fact(
            row.facts
                .get(label)
                .cloned()
                .unwrap_or_else(|| FactReference::new(String::new(), String::new())),
        ),
        SingularProjection::Hash(label) => SingularValue::Hash(
            row.facts
                .get(label)
                .map(|r| r.hash.clone())
                .unwrap_or_default(),
        ),
        SingularProjection::Field(label, field_name) => {
            let value = row
                .fields
                .get(&format!("{label}.{field_name}"))
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            SingularValue::Field(value)
        }
    }
}

fn compose_value(projection: &Projection, row: &Row, children: &[(String, FetchedRows)]) -> ProjectedValue {
    match projection {
        Projection::Singular(s) => ProjectedValue::Singular(singular_value(row, s)),
        Projection::Composite(components) => {
            let mut out = Vec::with_capacity(components.len());
            for nc in components {
                let value = match &nc.component {
                    Component::Singular(s) => ComponentValue::Singular(singular_value(row, s)),
                    Component::Specification(sp) => {
                        let child = children.iter().find(|(name, _)| name == &nc.name);
                        let nested = match child {
                            Some((_, fetched)) => compose_matching(&sp.projection, row, fetched),
                            None => Vec::new(),
                        };
                        ComponentValue::Nested(nested)
                    }
                };
                out.push((nc.name.clone(), value));
            }
            ProjectedValue::Composite(out)
        }
    }
}

/// Compose the rows of `fetched` that correlate to `parent_row` (by its
/// leading correlated columns) into the nested result shape `projection`
/// describes.
fn compose_matching(projection: &Projection, parent_row: &Row, fetched: &FetchedRows) -> Vec<ProjectedResult> {
    fetched
        .rows
        .iter()
        .filter(|row| {
            // A child row correlates to its parent iff every label the two
            // rows share agrees — the correlated labels are a subset of
            // both maps by construction (compile.rs binds them under the
            // same name in both scopes).
            row.facts
                .iter()
                .all(|(label, reference)| match parent_row.facts.get(label) {
                    Some(parent_reference) => parent_reference == reference,
                    None => true,
                })
        })
        .map(|row| ProjectedResult {
            tuple: row.facts.clone(),
            value: compose_value(projection, row, &fetched.children),
        })
        .collect()
}

/// Compose the full result set for a compiled plan: one `ProjectedResult`
/// per row of the root query, each carrying its nested children. `planned`
/// is accepted alongside `fetched` so the shape can be asserted/extended by
/// callers that hold both; composition itself only needs the projection and
/// the fetched rows, since `fetched.children` already mirrors `planned`.
pub fn compose(planned: &PlannedQuery, projection: &Projection, fetched: &FetchedRows) -> Vec<ProjectedResult> {
    debug_assert_eq!(planned.children.len(), fetched.children.len());
    fetched
        .rows
        .iter()
        .map(|row| ProjectedResult {
            tuple: row.facts.clone(),
            value: compose_value(projection, row, &fetched.children),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{QueryDescription, PlannedQuery};
    use crate::specification::builder::*;

    fn office_ref(n: &str) -> FactReference {
        FactReference::new("Office", n.to_string())
    }

    fn employee_ref(n: &str) -> FactReference {
        FactReference::new("Employee", n.to_string())
    }

    #[test]
    fn composes_nested_children_grouped_by_parent() {
        let projection = composite(vec![(
            "employees",
            nested(
                vec![one_match("e", "Employee", vec![])],
                crate::specification::Projection::Singular(
                    crate::specification::SingularProjection::Fact("e".to_string()),
                ),
            ),
        )]);

        let mut parent_row = Row::default();
        parent_row.facts.insert("o".to_string(), office_ref("1"));

        let mut child_row_match = Row::default();
        child_row_match.facts.insert("o".to_string(), office_ref("1"));
        child_row_match.facts.insert("e".to_string(), employee_ref("a"));

        let mut child_row_other = Row::default();
        child_row_other.facts.insert("o".to_string(), office_ref("2"));
        child_row_other.facts.insert("e".to_string(), employee_ref("b"));

        let fetched = FetchedRows {
            rows: vec![parent_row],
            children: vec![(
                "employees".to_string(),
                FetchedRows {
                    rows: vec![child_row_match, child_row_other],
                    children: Vec::new(),
                },
            )],
        };

        let planned = PlannedQuery {
            query: QueryDescription::new(),
            children: vec![(
                "employees".to_string(),
                PlannedQuery::leaf(QueryDescription::new()),
            )],
        };

        let results = compose(&planned, &projection, &fetched);
        assert_eq!(results.len(), 1);
        match &results[0].value {
            ProjectedValue::Composite(components) => {
                let (_, ComponentValue::Nested(nested)) = &components[0] else {
                    panic!("expected nested component");
                };
                assert_eq!(nested.len(), 1);
            }
            _ => panic!("expected composite projection"),
        }
    }
}
