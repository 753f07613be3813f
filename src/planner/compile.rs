//! Plan compilation (§4.3 "Compilation").
//!
//! Walks a [`Specification`]'s matches and conditions, emitting fact aliases
//! and edge joins into a [`QueryDescription`]. Positive existentials inline
//! directly into the current query; negative existentials fork a
//! [`NotExistsCondition`] subtree; nested specification-projections become
//! child [`PlannedQuery`] nodes, compiled with their own builder but sharing
//! the parent's label bindings (so a child can correlate against the
//! parent's already-bound labels).

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::model::Model;
use crate::specification::{
    Component, Condition, Match, Projection, Quantifier, Role, Specification,
};

use super::{
    EdgeDescription, FactDescription, FactIndex, InputDescription, NotExistsCondition,
    OutputDescription, Parameter, ParameterIndex, PlannedQuery, QueryDescription,
};

struct Builder<'m> {
    model: &'m Model,
    facts: Vec<FactDescription>,
    edges: Vec<EdgeDescription>,
    parameters: Vec<Parameter>,
    labels: HashMap<String, FactIndex>,
    pending_not_exists: Vec<NotExistsCondition>,
    /// Labels available from an enclosing query (label -> fact type), for
    /// compiling a nested specification-projection's child query.
    inherited: HashMap<String, String>,
    correlated_inputs: Vec<InputDescription>,
}

impl<'m> Builder<'m> {
    fn new(model: &'m Model, inherited: HashMap<String, String>) -> Self {
        Self {
            model,
            facts: Vec::new(),
            edges: Vec::new(),
            parameters: Vec::new(),
            labels: HashMap::new(),
            pending_not_exists: Vec::new(),
            inherited,
            correlated_inputs: Vec::new(),
        }
    }

    fn alloc_fact(&mut self, fact_type: String) -> FactIndex {
        let idx = self.facts.len();
        self.facts.push(FactDescription {
            fact_index: idx,
            fact_type,
        });
        idx
    }

    fn fact_type(&self, idx: FactIndex) -> String {
        self.facts[idx].fact_type.clone()
    }

    fn add_parameter(&mut self, p: Parameter) -> ParameterIndex {
        let idx = self.parameters.len();
        self.parameters.push(p);
        idx
    }

    fn bind_label(&mut self, label: String, idx: FactIndex) {
        self.labels.insert(label, idx);
    }

    /// Resolve a label to its fact alias, lazily materializing it as a
    /// correlated input the first time a nested child query references a
    /// label owned by its enclosing query.
    fn label_index(&mut self, label: &str) -> CoreResult<FactIndex> {
        if let Some(&idx) = self.labels.get(label) {
            return Ok(idx);
        }
        if let Some(fact_type) = self.inherited.get(label).cloned() {
            let idx = self.alloc_fact(fact_type);
            let param = self.add_parameter(Parameter::Correlated(label.to_string()));
            self.correlated_inputs.push(InputDescription {
                label: label.to_string(),
                fact_index: idx,
                fact_type_parameter: param,
                fact_hash_parameter: param,
            });
            self.bind_label(label.to_string(), idx);
            return Ok(idx);
        }
        Err(CoreError::MalformedSpecification(format!(
            "label '{label}' not bound"
        )))
    }

    /// Walk `roles` as predecessor steps from `start`, allocating a fresh
    /// fact alias per hop. The last hop reuses `terminal` instead of
    /// allocating, when given (used when the chain must land on an
    /// already-bound label rather than introducing a new one).
    fn compile_predecessor_chain(
        &mut self,
        start: FactIndex,
        roles: &[Role],
        terminal: Option<FactIndex>,
    ) -> CoreResult<FactIndex> {
        let mut current = start;
        let n = roles.len();
        for (i, role) in roles.iter().enumerate() {
            self.model
                .require_role(&self.fact_type(current), &role.name)?;
            let defining_type = self.fact_type(current);
            let param = self.add_parameter(Parameter::RoleId {
                defining_type,
                role: role.name.clone(),
            });
            let is_last = i == n - 1;
            let next = if is_last {
                terminal.unwrap_or_else(|| {
                    let idx = self.facts.len();
                    self.facts.push(FactDescription {
                        fact_index: idx,
                        fact_type: role.predecessor_type.clone(),
                    });
                    idx
                })
            } else {
                self.alloc_fact(role.predecessor_type.clone())
            };
            self.edges.push(EdgeDescription {
                edge_index: self.edges.len(),
                predecessor_fact_index: next,
                successor_fact_index: current,
                role_parameter: param,
            });
            current = next;
        }
        Ok(current)
    }

    /// Walk `roles` (the unknown's declared path to the boundary) in
    /// reverse, as successor steps, starting at `boundary` and finishing at
    /// a fact of `final_type`. Mirrors
    /// `specification::runner::walk_successors_reverse`.
    fn compile_successor_chain_to(
        &mut self,
        boundary: FactIndex,
        roles: &[Role],
        final_type: &str,
        terminal: Option<FactIndex>,
    ) -> FactIndex {
        let mut current = boundary;
        for i in (0..roles.len()).rev() {
            let successor_type = if i == 0 {
                final_type.to_string()
            } else {
                roles[i - 1].predecessor_type.clone()
            };
            let param = self.add_parameter(Parameter::RoleId {
                defining_type: successor_type.clone(),
                role: roles[i].name.clone(),
            });
            let is_final_hop = i == 0;
            let next = if is_final_hop {
                terminal.unwrap_or_else(|| {
                    let idx = self.facts.len();
                    self.facts.push(FactDescription {
                        fact_index: idx,
                        fact_type: successor_type.clone(),
                    });
                    idx
                })
            } else {
                let idx = self.facts.len();
                self.facts.push(FactDescription {
                    fact_index: idx,
                    fact_type: successor_type.clone(),
                });
                idx
            };
            self.edges.push(EdgeDescription {
                edge_index: self.edges.len(),
                predecessor_fact_index: current,
                successor_fact_index: next,
                role_parameter: param,
            });
            current = next;
        }
        current
    }

    /// Compile one `Path` condition. `binding` is `Some(unknown_type)` the
    /// first time a match's unknown is bound; `None` for later filter
    /// conditions against an already-bound label.
    fn compile_path(
        &mut self,
        scope_label: &str,
        scope_type_if_binding: Option<&str>,
        roles_left: &[Role],
        label_right: &str,
        roles_right: &[Role],
    ) -> CoreResult<()> {
        let label_start = self.label_index(label_right)?;
        let existing = self.labels.get(scope_label).copied();

        let boundary = if roles_left.is_empty() {
            self.compile_predecessor_chain(label_start, roles_right, existing)?
        } else {
            self.compile_predecessor_chain(label_start, roles_right, None)?
        };

        match scope_type_if_binding {
            Some(unknown_type) if roles_left.is_empty() => {
                self.bind_label(scope_label.to_string(), boundary);
                let _ = unknown_type;
            }
            Some(unknown_type) => {
                let idx = self.compile_successor_chain_to(boundary, roles_left, unknown_type, None);
                self.bind_label(scope_label.to_string(), idx);
            }
            None if roles_left.is_empty() => {
                // Degenerate filter shape (no walk on either side): nothing
                // further to constrain structurally.
            }
            None => {
                let existing = existing.ok_or_else(|| {
                    CoreError::MalformedSpecification(format!("label '{scope_label}' not bound"))
                })?;
                let final_type = self.fact_type(existing);
                self.compile_successor_chain_to(boundary, roles_left, &final_type, Some(existing));
            }
        }
        Ok(())
    }
}

/// Compile one match's conditions into `builder`, inlining positive
/// existentials and forking a `NotExistsCondition` for each negative one.
fn compile_match(
    builder: &mut Builder,
    m: &Match,
    not_exists_out: &mut Vec<NotExistsCondition>,
) -> CoreResult<()> {
    let Some(Condition::Path {
        roles_left,
        label_right,
        roles_right,
    }) = m.conditions.first()
    else {
        return Err(CoreError::MalformedSpecification(format!(
            "match '{}' must begin with a Path condition",
            m.unknown.name
        )));
    };
    builder.compile_path(
        &m.unknown.name,
        Some(&m.unknown.fact_type),
        roles_left,
        label_right,
        roles_right,
    )?;

    for cond in &m.conditions[1..] {
        compile_condition(builder, &m.unknown.name, cond, not_exists_out)?;
    }
    Ok(())
}

fn compile_condition(
    builder: &mut Builder,
    scope_label: &str,
    cond: &Condition,
    not_exists_out: &mut Vec<NotExistsCondition>,
) -> CoreResult<()> {
    match cond {
        Condition::Path {
            roles_left,
            label_right,
            roles_right,
        } => builder.compile_path(scope_label, None, roles_left, label_right, roles_right),
        Condition::Existential {
            quantifier: Quantifier::ExistsAll,
            matches,
        } => {
            for m in matches {
                compile_match(builder, m, not_exists_out)?;
            }
            Ok(())
        }
        Condition::Existential {
            quantifier: Quantifier::NotExists,
            matches,
        } => {
            let outer_types: HashMap<String, String> = builder
                .labels
                .iter()
                .map(|(l, &i)| (l.clone(), builder.fact_type(i)))
                .collect();
            let branch = compile_not_exists_branch(builder.model, &outer_types, matches)?;
            not_exists_out.push(branch);
            Ok(())
        }
    }
}

/// Compile a negative existential's matches in an isolated fact-index space,
/// correlated against the enclosing query's labels via `Parameter::Correlated`.
fn compile_not_exists_branch(
    model: &Model,
    outer_types: &HashMap<String, String>,
    matches: &[Match],
) -> CoreResult<NotExistsCondition> {
    let mut sub = Builder::new(model, outer_types.clone());
    let mut nested = Vec::new();
    for m in matches {
        compile_match(&mut sub, m, &mut nested)?;
    }
    let correlated = sub
        .correlated_inputs
        .iter()
        .map(|i| i.label.clone())
        .collect();
    Ok(NotExistsCondition {
        facts: sub.facts,
        edges: sub.edges,
        not_exists_conditions: nested,
        correlated,
    })
}

/// Compile `spec`'s given/matches/projection into a `PlannedQuery` tree.
/// Returns `Ok(None)` for an unsatisfiable plan (a path references a type or
/// role the model has never declared) rather than an error, matching §4.3's
/// "discarded before SQL generation".
pub fn compile(model: &Model, spec: &Specification) -> CoreResult<Option<PlannedQuery>> {
    compile_with_inherited(model, spec, HashMap::new())
}

fn compile_with_inherited(
    model: &Model,
    spec: &Specification,
    inherited: HashMap<String, String>,
) -> CoreResult<Option<PlannedQuery>> {
    let mut builder = Builder::new(model, inherited);
    let mut inputs = Vec::new();

    for given in &spec.given {
        if !model.has_type(&given.fact_type) {
            return Ok(None);
        }
        let idx = builder.alloc_fact(given.fact_type.clone());
        let type_param = builder.add_parameter(Parameter::FactTypeId(given.fact_type.clone()));
        let hash_param = builder.add_parameter(Parameter::Hash(String::new()));
        builder.bind_label(given.name.clone(), idx);
        inputs.push(InputDescription {
            label: given.name.clone(),
            fact_index: idx,
            fact_type_parameter: type_param,
            fact_hash_parameter: hash_param,
        });

        let mut top_not_exists = Vec::new();
        for cond in &given.conditions {
            compile_condition(&mut builder, &given.name, cond, &mut top_not_exists)?;
        }
        // Given-level not-exists conditions are folded into the query's
        // top-level list below, alongside matches' own.
        builder.pending_not_exists_from_givens(top_not_exists);
    }

    let mut not_exists_conditions = builder.take_pending_not_exists();
    for m in &spec.matches {
        if !model.has_type(&m.unknown.fact_type) {
            return Ok(None);
        }
        compile_match(&mut builder, m, &mut not_exists_conditions)?;
    }

    let outer_types: HashMap<String, String> = builder
        .labels
        .iter()
        .map(|(label, &idx)| (label.clone(), builder.fact_type(idx)))
        .collect();

    inputs.extend(builder.correlated_inputs.iter().cloned());
    let outputs = builder
        .labels
        .iter()
        .map(|(label, &idx)| OutputDescription {
            label: label.clone(),
            fact_type: builder.fact_type(idx),
            fact_index: idx,
        })
        .collect();

    let query = QueryDescription {
        inputs,
        facts: builder.facts,
        edges: builder.edges,
        not_exists_conditions,
        outputs,
        parameters: builder.parameters,
    };

    let children = compile_projection_children(model, &spec.projection, &outer_types)?;
    Ok(Some(PlannedQuery { query, children }))
}

/// Recurse into a projection, compiling a child `PlannedQuery` for each
/// nested specification-projection component. `outer_types` lets the child
/// resolve labels it references but does not declare itself.
fn compile_projection_children(
    model: &Model,
    projection: &Projection,
    outer_types: &HashMap<String, String>,
) -> CoreResult<Vec<(String, PlannedQuery)>> {
    let Projection::Composite(components) = projection else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for nc in components {
        if let Component::Specification(sp) = &nc.component {
            let child_spec = Specification {
                given: Vec::new(),
                matches: sp.matches.clone(),
                projection: sp.projection.clone(),
            };
            if let Some(child) = compile_with_inherited(model, &child_spec, outer_types.clone())? {
                out.push((nc.name.clone(), child));
            }
        }
    }
    Ok(out)
}

// Small helper extension kept private to this module: temporary storage for
// given-level not-exists conditions collected before matches are compiled,
// so they end up in the same top-level `not_exists_conditions` list.
impl<'m> Builder<'m> {
    fn pending_not_exists_from_givens(&mut self, mut conditions: Vec<NotExistsCondition>) {
        self.pending_not_exists.append(&mut conditions);
    }

    fn take_pending_not_exists(&mut self) -> Vec<NotExistsCondition> {
        std::mem::take(&mut self.pending_not_exists)
    }
}
