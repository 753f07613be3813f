//! # Inverter (§4.5)
//!
//! Turns a forward [`Specification`] into a set of [`SpecificationInverse`]
//! entries, one per originally-unknown label (every match's unknown, plus one
//! more per unknown nested inside an existential). Each entry re-roots the
//! specification's label graph on that unknown via a *shake-tree*: the chosen
//! label becomes the given, and every `Path` condition between it and the
//! rest of the graph is walked and, where its direction reverses, inverted
//! (`roles_left`/`roles_right` swapped). A reactive engine runs the inverse
//! with a newly-saved fact as its single given to decide whether a live
//! query's result set changed.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::fact::FactType;
use crate::model::Model;
use crate::specification::{
    Component, Condition, Given, Label, Match, Projection, Quantifier, Role, SingularProjection,
    Specification, UnknownDecl,
};

/// Whether a newly-discovered fact should be treated as adding to, or
/// removing from, the original query's result set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Add,
    Remove,
}

fn flip(parent: Operation, quantifier: Quantifier) -> Operation {
    let exists = quantifier == Quantifier::ExistsAll;
    let parent_is_add = parent == Operation::Add;
    if parent_is_add == exists {
        Operation::Add
    } else {
        Operation::Remove
    }
}

/// One re-rooted view of the original specification (§4.5).
#[derive(Clone, Debug, PartialEq)]
pub struct SpecificationInverse {
    pub inverse_specification: Specification,
    pub operation: Operation,
    /// Labels that were givens in the original specification.
    pub given_subset: Vec<Label>,
    /// Labels that identify the enclosing projection-nest's parent row.
    pub parent_subset: Vec<Label>,
    /// Dotted projection path this inverse belongs to (`""` for the root).
    pub path: String,
    /// Every label bound by the inverse specification, root included.
    pub result_subset: Vec<Label>,
}

type Edge = (Vec<Role>, Label, Vec<Role>);

/// One node of the label graph being re-rooted: a given or a match,
/// flattened out of whatever existential nesting it came from.
#[derive(Clone, Debug)]
struct Node {
    name: Label,
    fact_type: FactType,
    /// `None` for a given (no binding condition); for a match, its first
    /// (binding) `Path` condition.
    edge: Option<Edge>,
    /// Conditions beyond the binding one: filters and existentials, carried
    /// forward onto the rebuilt match verbatim.
    extra: Vec<Condition>,
    was_given: bool,
}

impl Node {
    fn from_given(g: &Given) -> Self {
        Self {
            name: g.name.clone(),
            fact_type: g.fact_type.clone(),
            edge: None,
            extra: g.conditions.clone(),
            was_given: true,
        }
    }

    fn from_match(m: &Match) -> Self {
        let edge = match m.conditions.first() {
            Some(Condition::Path {
                roles_left,
                label_right,
                roles_right,
            }) => Some((roles_left.clone(), label_right.clone(), roles_right.clone())),
            _ => None,
        };
        Self {
            name: m.unknown.name.clone(),
            fact_type: m.unknown.fact_type.clone(),
            edge,
            extra: m.conditions.get(1..).map(|s| s.to_vec()).unwrap_or_default(),
            was_given: false,
        }
    }
}

fn top_level_nodes(spec: &Specification) -> Vec<Node> {
    spec.given
        .iter()
        .map(Node::from_given)
        .chain(spec.matches.iter().map(Node::from_match))
        .collect()
}

/// Labels a condition list structurally references (the `label_right` of
/// every `Path`, including the binding condition of an existential's inner
/// matches — those can reach back out to an enclosing label).
fn referenced_labels(conditions: &[Condition]) -> Vec<Label> {
    let mut out = Vec::new();
    for cond in conditions {
        match cond {
            Condition::Path { label_right, .. } => out.push(label_right.clone()),
            Condition::Existential { matches, .. } => {
                for m in matches {
                    out.extend(referenced_labels(&m.conditions));
                }
            }
        }
    }
    out
}

/// Re-root `nodes` on `root`, producing a BFS order (excluding the root)
/// together with each node's new, possibly-inverted binding edge. Nodes
/// referenced but absent from `nodes` (an outer-scope label from a nested
/// specification-projection) are synthesized as untyped external leaves so
/// the walk can still complete.
fn reroot(nodes: &[Node], root: &str) -> Option<(Vec<(Node, Edge)>, HashMap<Label, FactType>)> {
    let mut by_name: HashMap<Label, Node> = nodes.iter().cloned().map(|n| (n.name.clone(), n)).collect();

    // Synthesize external leaves for any referenced label we don't have a
    // node for, so edges crossing into a nested projection's outer scope
    // don't break the walk.
    let mut referenced = HashSet::new();
    for n in nodes {
        if let Some((_, label_right, _)) = &n.edge {
            referenced.insert(label_right.clone());
        }
    }
    for label in referenced {
        by_name.entry(label.clone()).or_insert(Node {
            name: label,
            fact_type: String::new(),
            edge: None,
            extra: Vec::new(),
            was_given: true,
        });
    }

    if !by_name.contains_key(root) {
        return None;
    }

    // adjacency[a] = list of (b, directed edge owned by a pointing at b)
    let mut adjacency: HashMap<Label, Vec<(Label, Edge)>> = HashMap::new();
    for n in by_name.values() {
        if let Some(edge) = &n.edge {
            adjacency.entry(n.name.clone()).or_default().push((edge.1.clone(), edge.clone()));
        }
    }

    let mut visited: HashSet<Label> = HashSet::new();
    visited.insert(root.to_string());
    let mut queue: VecDeque<Label> = VecDeque::new();
    queue.push_back(root.to_string());
    let mut types: HashMap<Label, FactType> = HashMap::new();
    types.insert(root.to_string(), by_name[root].fact_type.clone());
    let mut order: Vec<(Node, Edge)> = Vec::new();

    while let Some(cur) = queue.pop_front() {
        // Edges cur owns, pointing outward: cur's neighbor becomes cur's
        // child, so the neighbor's new edge must be inverted relative to
        // cur's original direction.
        if let Some(outs) = adjacency.get(&cur) {
            for (neighbor, (roles_left, _label_right, roles_right)) in outs.clone() {
                if visited.insert(neighbor.clone()) {
                    let new_edge: Edge = (roles_right, cur.clone(), roles_left);
                    let node = by_name[&neighbor].clone();
                    types.insert(neighbor.clone(), node.fact_type.clone());
                    order.push((node, new_edge));
                    queue.push_back(neighbor);
                }
            }
        }
        // Edges that point *at* cur (cur is some other node's label_right):
        // that node's original edge already points the right way.
        for n in by_name.values() {
            if let Some(edge) = &n.edge {
                if edge.1 == cur && visited.insert(n.name.clone()) {
                    types.insert(n.name.clone(), n.fact_type.clone());
                    order.push((n.clone(), edge.clone()));
                    queue.push_back(n.name.clone());
                }
            }
        }
    }

    if visited.len() != by_name.len() {
        return None;
    }
    Some((order, types))
}

/// Best-effort reordering so each match's extra conditions only reference
/// labels already bound earlier in the list, bounded by a per-position cap
/// of `n` and a global cap of `n^2` swaps (§4.5 step 3).
fn shake(mut order: Vec<(Node, Edge)>, root: &str) -> Vec<(Node, Edge)> {
    let n = order.len();
    let global_cap = n.saturating_mul(n).max(1);
    let mut bound: HashSet<Label> = HashSet::new();
    bound.insert(root.to_string());
    let mut swaps = 0usize;

    let mut i = 0;
    while i < order.len() {
        let requires = referenced_labels(&order[i].0.extra);
        if requires.iter().all(|l| bound.contains(l)) {
            bound.insert(order[i].0.name.clone());
            i += 1;
            continue;
        }
        let mut attempts = 0usize;
        while attempts < n && swaps < global_cap && i + 1 + attempts < order.len() {
            order.swap(i, i + 1 + attempts);
            swaps += 1;
            attempts += 1;
            let requires = referenced_labels(&order[i].0.extra);
            if requires.iter().all(|l| bound.contains(l)) {
                break;
            }
        }
        // Dependency still unmet after the budget: leave it in place. The
        // evaluator surfaces a malformed-specification error if the
        // reference is genuinely unresolved.
        bound.insert(order[i].0.name.clone());
        i += 1;
    }
    order
}

fn edge_to_condition(edge: &Edge) -> Condition {
    Condition::Path {
        roles_left: edge.0.clone(),
        label_right: edge.1.clone(),
        roles_right: edge.2.clone(),
    }
}

fn all_singular_composite(labels: &[Label]) -> Projection {
    Projection::Composite(
        labels
            .iter()
            .map(|l| crate::specification::NamedComponent {
                name: l.clone(),
                component: Component::Singular(SingularProjection::Fact(l.clone())),
            })
            .collect(),
    )
}

fn build_inverse_for_root(
    nodes: &[Node],
    root_name: &str,
    root_type: &str,
    path: &str,
    operation: Operation,
) -> Option<SpecificationInverse> {
    let (order, _types) = reroot(nodes, root_name)?;

    // Simplify (§4.5 step 4): discard inverses that need L's successors at
    // creation time.
    for (_, edge) in &order {
        if edge.1 == root_name && edge.2.is_empty() && !edge.0.is_empty() {
            return None;
        }
    }

    let order = shake(order, root_name);

    let matches: Vec<Match> = order
        .iter()
        .map(|(node, edge)| Match {
            unknown: UnknownDecl {
                name: node.name.clone(),
                fact_type: node.fact_type.clone(),
            },
            conditions: std::iter::once(edge_to_condition(edge))
                .chain(node.extra.iter().cloned())
                .collect(),
        })
        .collect();

    let given_subset: Vec<Label> = nodes
        .iter()
        .filter(|n| n.was_given)
        .map(|n| n.name.clone())
        .collect();

    let mut result_subset: Vec<Label> = vec![root_name.to_string()];
    result_subset.extend(order.iter().map(|(n, _)| n.name.clone()));

    let inverse_specification = Specification {
        given: vec![Given {
            name: root_name.to_string(),
            fact_type: root_type.to_string(),
            conditions: Vec::new(),
        }],
        matches,
        projection: all_singular_composite(&result_subset),
    };

    Some(SpecificationInverse {
        inverse_specification,
        operation,
        parent_subset: given_subset.clone(),
        given_subset,
        path: path.to_string(),
        result_subset,
    })
}

/// Recurse through `nodes`' existential conditions, producing one inverse
/// per unknown nested inside each, flipping `operation` per the
/// parent-operation × quantifier table and recursing into further nesting.
fn invert_existentials(
    nodes_so_far: &[Node],
    scan: &[Node],
    parent_op: Operation,
    path: &str,
    out: &mut Vec<SpecificationInverse>,
) {
    for owner in scan {
        for (i, cond) in owner.extra.iter().enumerate() {
            if let Condition::Existential { quantifier, matches } = cond {
                let inner_nodes: Vec<Node> = matches.iter().map(Node::from_match).collect();

                // `owner`'s entry carries this existential in its own
                // `extra`; strip just this occurrence (other conditions on
                // `owner` stay) before rerooting, so the rebuilt matches
                // don't carry a duplicate, self-referential copy of the
                // condition being inverted — its inner matches are already
                // present via `inner_nodes`.
                let combined: Vec<Node> = nodes_so_far
                    .iter()
                    .map(|n| {
                        if n.name == owner.name {
                            let mut stripped = n.clone();
                            stripped.extra.remove(i);
                            stripped
                        } else {
                            n.clone()
                        }
                    })
                    .chain(inner_nodes.clone())
                    .collect();

                let op = flip(parent_op, *quantifier);
                for im in &inner_nodes {
                    if let Some(inv) = build_inverse_for_root(&combined, &im.name, &im.fact_type, path, op) {
                        out.push(inv);
                    }
                }
                invert_existentials(&combined, &inner_nodes, op, path, out);
            }
        }
    }
}

fn invert_level(spec: &Specification, path: &str, out: &mut Vec<SpecificationInverse>) {
    let nodes = top_level_nodes(spec);

    for n in nodes.iter().filter(|n| !n.was_given) {
        if let Some(inv) = build_inverse_for_root(&nodes, &n.name, &n.fact_type, path, Operation::Add) {
            out.push(inv);
        }
    }
    invert_existentials(&nodes, &nodes, Operation::Add, path, out);

    if let Projection::Composite(components) = &spec.projection {
        for nc in components {
            if let Component::Specification(sp) = &nc.component {
                let child_path = format!("{path}.{}", nc.name);
                let child_spec = Specification {
                    given: Vec::new(),
                    matches: sp.matches.clone(),
                    projection: sp.projection.clone(),
                };
                invert_level(&child_spec, &child_path, out);
            }
        }
    }
}

/// Compute every `SpecificationInverse` for `spec` (§4.5). `model` is
/// accepted for parity with the rest of the subsystem (role validity is
/// assumed already checked by the validator) and is currently unused by the
/// purely structural shake-tree transform.
pub fn invert(_model: &Model, spec: &Specification) -> Vec<SpecificationInverse> {
    let mut out = Vec::new();
    invert_level(spec, "", &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::builder::*;

    #[test]
    fn inverts_a_single_successor_match() {
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

        let inverses = invert(&model, &spec);
        assert_eq!(inverses.len(), 1);
        let inv = &inverses[0];
        assert_eq!(inv.operation, Operation::Add);
        assert_eq!(inv.inverse_specification.given[0].name, "e");
        assert_eq!(inv.inverse_specification.matches.len(), 1);
        assert_eq!(inv.inverse_specification.matches[0].unknown.name, "o");
        let Condition::Path { roles_left, roles_right, .. } = &inv.inverse_specification.matches[0].conditions[0] else {
            panic!("expected path condition");
        };
        assert!(roles_left.is_empty());
        assert_eq!(roles_right.len(), 1);
        assert_eq!(roles_right[0].name, "office");
    }

    #[test]
    fn zigzag_match_inverts_through_synthetic_boundary() {
        let e = LabelRef::new("e");
        let spec = SpecificationBuilder::new()
            .given("e", "Employee")
            .matching(
                "p",
                "President",
                vec![path(
                    vec![role("office", "Office")],
                    &e,
                    vec![role("office", "Office")],
                )],
            )
            .project_fact("p");

        let model = Model::new();
        let inverses = invert(&model, &spec);
        assert_eq!(inverses.len(), 1);
        assert_eq!(inverses[0].inverse_specification.given[0].name, "p");
        assert_eq!(inverses[0].inverse_specification.matches[0].unknown.name, "e");
    }

    #[test]
    fn not_exists_unknown_inverts_with_remove_operation() {
        let model = Model::new()
            .role("Employee", "office", "Office")
            .role("Office.Closed", "office", "Office");

        let o = LabelRef::new("o");
        let spec = SpecificationBuilder::new()
            .given_where(
                "o",
                "Office",
                vec![not_exists(vec![one_match(
                    "c",
                    "Office.Closed",
                    vec![successor(vec![role("office", "Office")], &o)],
                )])],
            )
            .matching(
                "e",
                "Employee",
                vec![successor(vec![role("office", "Office")], &o)],
            )
            .project_fact("e");

        let inverses = invert(&model, &spec);
        let closed_inverse = inverses
            .iter()
            .find(|inv| inv.inverse_specification.given[0].name == "c")
            .expect("an inverse rooted at the negative existential's unknown");
        assert_eq!(closed_inverse.operation, Operation::Remove);
    }

    #[test]
    fn creation_time_successor_dependency_is_discarded() {
        // A match whose only condition demands walking *successors* of the
        // freshly created root is unsatisfiable and must not appear.
        let nodes = vec![
            Node {
                name: "a".to_string(),
                fact_type: "A".to_string(),
                edge: None,
                extra: Vec::new(),
                was_given: true,
            },
            Node {
                name: "b".to_string(),
                fact_type: "B".to_string(),
                edge: Some((vec![Role::new("r", "A")], "a".to_string(), Vec::new())),
                extra: Vec::new(),
                was_given: false,
            },
        ];
        let inv = build_inverse_for_root(&nodes, "a", "A", "", Operation::Add);
        assert!(inv.is_none());
    }
}
