//! # Predecessor/Successor split (§4.7)
//!
//! `split_before_first_successor` partitions a specification at its first
//! "successor-bearing" match into a deterministic, in-memory-runnable `head`
//! and a store-runnable `tail`. Shared by the authorization engine (§4.6,
//! `isAuthorized` runs `head` on the submitted fact graph and `tail` against
//! the store) and the feed builder (§4.4).

use crate::specification::{Condition, Given, Match, Projection, Specification, UnknownDecl};

/// The result of splitting a specification at its pivot match.
pub struct Split {
    /// `None` when the whole specification is head-only (no pivot found).
    pub head: Option<Specification>,
    /// `None` when the split heuristic bails out (pivot has more than one
    /// path condition); in that case the caller should run the entire
    /// original specification as `tail`.
    pub tail: Option<Specification>,
}

fn is_pivot(m: &Match) -> bool {
    if m.conditions.len() > 1 {
        return true;
    }
    match m.conditions.first() {
        Some(Condition::Existential { .. }) => true,
        Some(Condition::Path { roles_left, .. }) => !roles_left.is_empty(),
        None => false,
    }
}

/// Split `spec` at its first pivot match (§4.7).
pub fn split_before_first_successor(spec: &Specification) -> Split {
    let pivot_index = spec.matches.iter().position(is_pivot);

    let Some(pivot_index) = pivot_index else {
        // No pivot: the entire spec is head-only.
        return Split {
            head: Some(spec.clone()),
            tail: None,
        };
    };

    let pivot = &spec.matches[pivot_index];
    if pivot.conditions.len() > 1 {
        // Not well-defined: preserve the original's fallback of running the
        // whole thing in `tail` (§9 open question).
        return Split {
            head: None,
            tail: Some(spec.clone()),
        };
    }

    let Some(Condition::Path {
        roles_left,
        label_right,
        roles_right,
    }) = pivot.conditions.first()
    else {
        return Split {
            head: None,
            tail: Some(spec.clone()),
        };
    };

    if roles_right.is_empty() {
        // Pure successor step: everything before the pivot is head,
        // projecting what tail still needs as givens; pivot onward is tail.
        let preceding: Vec<Match> = spec.matches[..pivot_index].to_vec();
        let remaining: Vec<Match> = spec.matches[pivot_index..].to_vec();

        let tail_givens: Vec<Given> = spec
            .given
            .iter()
            .cloned()
            .chain(preceding.iter().map(|m| Given {
                name: m.unknown.name.clone(),
                fact_type: m.unknown.fact_type.clone(),
                conditions: Vec::new(),
            }))
            .collect();

        let head = Specification {
            given: spec.given.clone(),
            matches: preceding,
            projection: Projection::Composite(Vec::new()),
        };
        let tail = Specification {
            given: tail_givens,
            matches: remaining,
            projection: spec.projection.clone(),
        };
        return Split {
            head: Some(head),
            tail: Some(tail),
        };
    }

    // Split the pivot itself: synthetic label `s1` of the boundary type.
    let boundary_type = roles_right
        .last()
        .map(|r| r.predecessor_type.clone())
        .unwrap_or_else(|| {
            spec.given
                .iter()
                .find(|g| &g.name == label_right)
                .map(|g| g.fact_type.clone())
                .unwrap_or_default()
        });

    let synthetic_label = "s1".to_string();

    let head_match = Match {
        unknown: UnknownDecl {
            name: synthetic_label.clone(),
            fact_type: boundary_type.clone(),
        },
        conditions: vec![Condition::Path {
            roles_left: Vec::new(),
            label_right: label_right.clone(),
            roles_right: roles_right.clone(),
        }],
    };
    let head = Specification {
        given: spec.given.clone(),
        matches: spec.matches[..pivot_index]
            .iter()
            .cloned()
            .chain(std::iter::once(head_match))
            .collect(),
        projection: Projection::Composite(Vec::new()),
    };

    let tail_pivot = Match {
        unknown: pivot.unknown.clone(),
        conditions: vec![Condition::Path {
            roles_left: roles_left.clone(),
            label_right: synthetic_label.clone(),
            roles_right: Vec::new(),
        }],
    };
    let tail = Specification {
        given: vec![Given {
            name: synthetic_label,
            fact_type: boundary_type,
            conditions: Vec::new(),
        }],
        matches: std::iter::once(tail_pivot)
            .chain(spec.matches[pivot_index + 1..].iter().cloned())
            .collect(),
        projection: spec.projection.clone(),
    };

    Split {
        head: Some(head),
        tail: Some(tail),
    }
}
