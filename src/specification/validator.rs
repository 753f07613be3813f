//! # Specification Validator (§4.1)
//!
//! Rejects structurally invalid or disconnected specifications before any
//! execution. Two independent checks: the invariant check (match shape) and
//! the connectivity check (label reachability), the latter controllable via
//! [`ConnectivityMode`].

use std::collections::{HashMap, HashSet};

use tracing::warn;

use super::{Component, Condition, Label, Match, Projection, Quantifier, Specification};
use crate::error::{ConnectivityMode, CoreError, CoreResult};

/// Validate a specification's shape and connectivity.
pub fn validate(spec: &Specification, mode: ConnectivityMode) -> CoreResult<()> {
    check_invariants(spec)?;
    check_connectivity(spec, mode)
}

// ---------------------------------------------------------------------
// Invariant check (§4.1 a/b/c)
// ---------------------------------------------------------------------

fn check_invariants(spec: &Specification) -> CoreResult<()> {
    let mut scope: HashSet<Label> = spec.given.iter().map(|g| g.name.clone()).collect();
    check_match_list(&spec.matches, &mut scope)
}

fn check_match_list(matches: &[Match], scope: &mut HashSet<Label>) -> CoreResult<()> {
    for (i, m) in matches.iter().enumerate() {
        if m.conditions.is_empty() && i > 0 {
            return Err(CoreError::MalformedSpecification(format!(
                "non-first match '{}' has zero conditions",
                m.unknown.name
            )));
        }
        if let Some(first) = m.conditions.first() {
            if i > 0 && !first.is_path() {
                return Err(CoreError::MalformedSpecification(format!(
                    "match '{}' must begin with a Path condition",
                    m.unknown.name
                )));
            }
            if let Condition::Path { label_right, .. } = first {
                if !scope.contains(label_right) {
                    return Err(CoreError::MalformedSpecification(format!(
                        "match '{}': labelRight '{}' is not in scope",
                        m.unknown.name, label_right
                    )));
                }
            }
        } else if i == 0 {
            // The first match in a scope may have zero conditions only when
            // it is the sole match (no prior label to bind to); still must
            // not reference anything out of scope, which is vacuously true.
        }

        for cond in &m.conditions {
            check_condition_scope(cond, scope)?;
        }

        scope.insert(m.unknown.name.clone());
    }
    Ok(())
}

fn check_condition_scope(cond: &Condition, scope: &HashSet<Label>) -> CoreResult<()> {
    match cond {
        Condition::Path { label_right, .. } => {
            if !scope.contains(label_right) {
                return Err(CoreError::MalformedSpecification(format!(
                    "labelRight '{label_right}' is not in scope"
                )));
            }
            Ok(())
        }
        Condition::Existential { matches, .. } => {
            // The enclosing unknown is in scope for the nested matches too.
            let mut inner_scope = scope.clone();
            check_match_list(matches, &mut inner_scope)
        }
    }
}

// ---------------------------------------------------------------------
// Connectivity check (§4.1 connectivity)
// ---------------------------------------------------------------------

struct UnionFind {
    parent: HashMap<Label, Label>,
}

impl UnionFind {
    fn new() -> Self {
        Self {
            parent: HashMap::new(),
        }
    }

    fn find(&mut self, x: &Label) -> Label {
        let p = self.parent.entry(x.clone()).or_insert_with(|| x.clone()).clone();
        if &p == x {
            x.clone()
        } else {
            let root = self.find(&p);
            self.parent.insert(x.clone(), root.clone());
            root
        }
    }

    fn union(&mut self, a: &Label, b: &Label) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.insert(ra, rb);
        }
    }

    fn ensure(&mut self, x: &Label) {
        self.parent.entry(x.clone()).or_insert_with(|| x.clone());
    }
}

fn collect_edges(matches: &[Match], uf: &mut UnionFind, referenced: &mut HashSet<Label>) {
    for m in matches {
        uf.ensure(&m.unknown.name);
        for cond in &m.conditions {
            match cond {
                Condition::Path { label_right, .. } => {
                    uf.union(&m.unknown.name, label_right);
                    referenced.insert(label_right.clone());
                    referenced.insert(m.unknown.name.clone());
                }
                Condition::Existential {
                    matches: inner, ..
                } => {
                    // The enclosing unknown is reachable from everything the
                    // nested matches touch.
                    for im in inner {
                        uf.ensure(&im.unknown.name);
                        uf.union(&m.unknown.name, &im.unknown.name);
                    }
                    collect_edges(inner, uf, referenced);
                }
            }
        }
    }
}

fn collect_projection_labels(projection: &Projection, out: &mut HashSet<Label>) {
    match projection {
        Projection::Singular(s) => {
            out.insert(s.label().clone());
        }
        Projection::Composite(components) => {
            for nc in components {
                match &nc.component {
                    Component::Singular(s) => {
                        out.insert(s.label().clone());
                    }
                    Component::Specification(sp) => {
                        // Nested specification-projections introduce their
                        // own scope; any of their matches referencing an
                        // outer label keeps that label connected.
                        for m in &sp.matches {
                            for cond in &m.conditions {
                                if let Condition::Path { label_right, .. } = cond {
                                    out.insert(label_right.clone());
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn check_connectivity(spec: &Specification, mode: ConnectivityMode) -> CoreResult<()> {
    if mode == ConnectivityMode::Off {
        return Ok(());
    }
    if spec.is_identity() {
        return Ok(());
    }

    let mut uf = UnionFind::new();
    let mut referenced = HashSet::new();
    for g in &spec.given {
        uf.ensure(&g.name);
        for cond in &g.conditions {
            if let Condition::Existential { matches, .. } = cond {
                for im in matches {
                    uf.ensure(&im.unknown.name);
                    uf.union(&g.name, &im.unknown.name);
                }
                collect_edges(matches, &mut uf, &mut referenced);
            }
        }
    }
    collect_edges(&spec.matches, &mut uf, &mut referenced);

    let mut projection_labels = HashSet::new();
    collect_projection_labels(&spec.projection, &mut projection_labels);
    for l in &projection_labels {
        uf.ensure(l);
    }

    let all_labels: Vec<Label> = uf.parent.keys().cloned().collect();
    if all_labels.is_empty() {
        return Ok(());
    }

    // (a) isolated labels: components of size 1 that are not referenced at all.
    let mut component_sizes: HashMap<Label, usize> = HashMap::new();
    for l in &all_labels {
        let mut uf2 = uf.find(l);
        uf2 = uf.find(&uf2);
        *component_sizes.entry(uf2).or_insert(0) += 1;
    }

    let projection_roots: HashSet<Label> =
        projection_labels.iter().map(|l| uf.find(l)).collect();

    // (a) a label whose component has no other member and isn't the
    // projection's own component is isolated: nothing ties it to the rest of
    // the specification and the projection never reaches it either (an
    // unused `given`, most commonly). A singleton component that *is* the
    // projection's component is fine (e.g. `given o, project o`).
    let isolated: Vec<String> = all_labels
        .iter()
        .filter(|l| {
            let root = uf.find(l);
            component_sizes.get(&root).copied().unwrap_or(0) == 1 && !projection_roots.contains(&root)
        })
        .cloned()
        .collect();
    if !isolated.is_empty() {
        return fail_disconnected(mode, isolated);
    }

    if projection_roots.len() > 1 {
        let offenders: Vec<String> = all_labels
            .iter()
            .filter(|l| {
                let r = uf.find(l);
                projection_roots.contains(&r)
            })
            .cloned()
            .collect();
        return fail_disconnected(mode, offenders);
    }

    // (c) every non-given label must be in the projection's component.
    let given_names: HashSet<Label> = spec.given.iter().map(|g| g.name.clone()).collect();
    let target_root = projection_roots.iter().next().cloned();
    if let Some(target_root) = target_root {
        let mut offenders = Vec::new();
        for l in &all_labels {
            if given_names.contains(l) {
                continue;
            }
            if uf.find(l) != target_root {
                offenders.push(l.clone());
            }
        }
        if !offenders.is_empty() {
            return fail_disconnected(mode, offenders);
        }
    }

    Ok(())
}

fn fail_disconnected(mode: ConnectivityMode, offenders: Vec<String>) -> CoreResult<()> {
    match mode {
        ConnectivityMode::Off => Ok(()),
        ConnectivityMode::Warn => {
            warn!(labels = ?offenders, "specification is disconnected");
            Ok(())
        }
        ConnectivityMode::Error => Err(CoreError::DisconnectedSpecification(offenders)),
    }
}
