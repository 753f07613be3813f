//! # Feed builder (§4.4)
//!
//! Produces a set of normalized, content-addressable *feeds* from a
//! specification: the shape a subscriber listens to, with no projection.
//! Positive existentials are absorbed into the parent feed's plan; each
//! negative existential branches off an additional feed describing the
//! refuting shape (so a reversal of the negative can be detected); nested
//! specification-projections recurse into feeds attached to their parent's
//! terminal tuple.

use sha2::{Digest, Sha256};

use crate::error::CoreResult;
use crate::model::Model;
use crate::planner::compile::compile;
use crate::planner::QueryDescription;
use crate::specification::{Component, Condition, Given, Match, Projection, Quantifier, Specification};

pub type FeedId = String;

/// One feed: the compiled shape a subscriber listens to, plus the dotted
/// projection path it's attached to (`""` for the root).
#[derive(Clone, Debug, PartialEq)]
pub struct Feed {
    pub path: String,
    pub query: QueryDescription,
}

impl Feed {
    /// The feed's structural identity: a SHA-256 hash over its canonical
    /// debug representation. Two specifications that compile to
    /// structurally identical feeds share subscribers.
    pub fn id(&self) -> FeedId {
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.query).as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A condition list with every negative existential stripped out, recursing
/// through positive existentials (which don't branch the feed set
/// themselves, but whose own nested matches may carry further negatives).
fn strip_conditions(conditions: &[Condition]) -> Vec<Condition> {
    conditions
        .iter()
        .filter_map(|c| match c {
            Condition::Existential {
                quantifier: Quantifier::NotExists,
                ..
            } => None,
            Condition::Existential {
                quantifier: Quantifier::ExistsAll,
                matches: inner,
            } => Some(Condition::Existential {
                quantifier: Quantifier::ExistsAll,
                matches: strip_not_exists(inner),
            }),
            other => Some(other.clone()),
        })
        .collect()
}

/// Specification matches with every negative existential stripped out, used
/// to compile the "positive skeleton" feed.
fn strip_not_exists(matches: &[Match]) -> Vec<Match> {
    matches
        .iter()
        .map(|m| Match {
            unknown: m.unknown.clone(),
            conditions: strip_conditions(&m.conditions),
        })
        .collect()
}

/// Given declarations with every negative existential stripped from their
/// own conditions (set via `given_where`), symmetric with `strip_not_exists`.
fn strip_not_exists_given(given: &[Given]) -> Vec<Given> {
    given
        .iter()
        .map(|g| Given {
            name: g.name.clone(),
            fact_type: g.fact_type.clone(),
            conditions: strip_conditions(&g.conditions),
        })
        .collect()
}

/// Collect every negative existential's nested match list out of a condition
/// list, recursing through positive existentials.
fn collect_branches_from_conditions(conditions: &[Condition]) -> Vec<Vec<Match>> {
    let mut out = Vec::new();
    for c in conditions {
        match c {
            Condition::Existential {
                quantifier: Quantifier::NotExists,
                matches: inner,
            } => out.push(inner.clone()),
            Condition::Existential {
                quantifier: Quantifier::ExistsAll,
                matches: inner,
            } => out.extend(collect_not_exists_branches(inner)),
            Condition::Path { .. } => {}
        }
    }
    out
}

/// Collect every negative existential's nested match list, recursing
/// through positive existentials (which don't branch the feed set
/// themselves).
fn collect_not_exists_branches(matches: &[Match]) -> Vec<Vec<Match>> {
    let mut out = Vec::new();
    for m in matches {
        out.extend(collect_branches_from_conditions(&m.conditions));
    }
    out
}

/// Collect every negative existential's nested match list out of a spec's
/// given declarations (set via `given_where`), symmetric with
/// `collect_not_exists_branches`.
fn collect_not_exists_branches_given(given: &[Given]) -> Vec<Vec<Match>> {
    let mut out = Vec::new();
    for g in given {
        out.extend(collect_branches_from_conditions(&g.conditions));
    }
    out
}

/// Condition list with every negative existential stripped, except the
/// `target`-th one encountered in document order (counted by `seen`), which
/// is kept verbatim so the refuting feed for that occurrence still carries
/// its own `not_exists_conditions` entry.
fn strip_conditions_except(conditions: &[Condition], seen: &mut usize, target: usize) -> Vec<Condition> {
    conditions
        .iter()
        .filter_map(|c| match c {
            Condition::Existential {
                quantifier: Quantifier::NotExists,
                matches: inner,
            } => {
                let index = *seen;
                *seen += 1;
                if index == target {
                    Some(Condition::Existential {
                        quantifier: Quantifier::NotExists,
                        matches: inner.clone(),
                    })
                } else {
                    None
                }
            }
            Condition::Existential {
                quantifier: Quantifier::ExistsAll,
                matches: inner,
            } => Some(Condition::Existential {
                quantifier: Quantifier::ExistsAll,
                matches: strip_matches_except(inner, seen, target),
            }),
            other => Some(other.clone()),
        })
        .collect()
}

fn strip_matches_except(matches: &[Match], seen: &mut usize, target: usize) -> Vec<Match> {
    matches
        .iter()
        .map(|m| Match {
            unknown: m.unknown.clone(),
            conditions: strip_conditions_except(&m.conditions, seen, target),
        })
        .collect()
}

fn strip_given_except(given: &[Given], seen: &mut usize, target: usize) -> Vec<Given> {
    given
        .iter()
        .map(|g| Given {
            name: g.name.clone(),
            fact_type: g.fact_type.clone(),
            conditions: strip_conditions_except(&g.conditions, seen, target),
        })
        .collect()
}

fn build_feeds_at(model: &Model, spec: &Specification, path: &str, out: &mut Vec<Feed>) -> CoreResult<()> {
    let skeleton = Specification {
        given: strip_not_exists_given(&spec.given),
        matches: strip_not_exists(&spec.matches),
        projection: Projection::Composite(Vec::new()),
    };
    if let Some(planned) = compile(model, &skeleton)? {
        out.push(Feed {
            path: path.to_string(),
            query: planned.query,
        });
    }

    let branches: Vec<Vec<Match>> = collect_not_exists_branches_given(&spec.given)
        .into_iter()
        .chain(collect_not_exists_branches(&spec.matches))
        .collect();

    // Given/matches are walked in the same document order here as in
    // `collect_not_exists_branches{,_given}` above, so `target == i` keeps
    // exactly the occurrence that produced `branch_matches`.
    for (i, branch_matches) in branches.into_iter().enumerate() {
        let mut seen = 0;
        let given = strip_given_except(&spec.given, &mut seen, i);
        let matches = strip_matches_except(&spec.matches, &mut seen, i);
        let refuting = Specification {
            given,
            matches: matches.into_iter().chain(branch_matches).collect(),
            projection: Projection::Composite(Vec::new()),
        };
        if let Some(planned) = compile(model, &refuting)? {
            out.push(Feed {
                path: path.to_string(),
                query: planned.query,
            });
        }
    }

    if let Projection::Composite(components) = &spec.projection {
        for nc in components {
            if let Component::Specification(sp) = &nc.component {
                let child_path = if path.is_empty() {
                    format!(".{}", nc.name)
                } else {
                    format!("{path}.{}", nc.name)
                };
                let child_spec = Specification {
                    given: Vec::new(),
                    matches: sp.matches.clone(),
                    projection: sp.projection.clone(),
                };
                build_feeds_at(model, &child_spec, &child_path, out)?;
            }
        }
    }

    Ok(())
}

/// Build the full feed set for `spec`: the positive skeleton, one feed per
/// negative-existential branch, and recursively, feeds for every nested
/// specification-projection.
pub fn build_feeds(model: &Model, spec: &Specification) -> CoreResult<Vec<Feed>> {
    let mut out = Vec::new();
    build_feeds_at(model, spec, "", &mut out)?;
    Ok(out)
}
