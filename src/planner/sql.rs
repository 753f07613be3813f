//! SQL text generation (§4.3 "SQL generation").
//!
//! Renders a [`QueryDescription`] as either a *feed query* (paginated,
//! bookmark-ordered, used by `Storage::feed`) or a *result query* (full
//! projection data, no bookmark/limit, used by `Storage::read`). Joins are
//! emitted in the order edges were added; a `NOT EXISTS` branch renders as a
//! correlated subquery referencing its parent's already-written aliases.

use std::collections::HashSet;
use std::fmt::Write as _;

use super::{EdgeDescription, FactDescription, NotExistsCondition, QueryDescription};

fn fact_alias(prefix: &str, idx: usize) -> String {
    format!("{prefix}f{idx}")
}

fn edge_alias(prefix: &str, idx: usize) -> String {
    format!("{prefix}e{idx}")
}

/// Render the FROM/JOIN clauses for `facts`/`edges`, starting from
/// `start_fact`, tracking which aliases have already been written so edges
/// that connect two known aliases become pure joins rather than introducing
/// a new fact table.
fn render_joins(
    out: &mut String,
    prefix: &str,
    facts: &[FactDescription],
    edges: &[EdgeDescription],
    start_fact: usize,
    written: &mut HashSet<usize>,
) {
    if written.insert(start_fact) {
        let _ = writeln!(
            out,
            "FROM fact {} -- type={}",
            fact_alias(prefix, start_fact),
            facts[start_fact].fact_type
        );
    }
    for edge in edges {
        let e = edge_alias(prefix, edge.edge_index);
        let _ = writeln!(out, "JOIN edge {e} ON {e}.role_id = ${}", edge.role_parameter);

        let pred_new = written.insert(edge.predecessor_fact_index);
        let pred_alias = fact_alias(prefix, edge.predecessor_fact_index);
        if pred_new {
            let _ = writeln!(
                out,
                "JOIN fact {pred_alias} ON {pred_alias}.fact_id = {e}.predecessor_fact_id -- type={}",
                facts[edge.predecessor_fact_index].fact_type
            );
        } else {
            let _ = writeln!(out, "  AND {e}.predecessor_fact_id = {pred_alias}.fact_id");
        }

        let succ_new = written.insert(edge.successor_fact_index);
        let succ_alias = fact_alias(prefix, edge.successor_fact_index);
        if succ_new {
            let _ = writeln!(
                out,
                "JOIN fact {succ_alias} ON {succ_alias}.fact_id = {e}.successor_fact_id -- type={}",
                facts[edge.successor_fact_index].fact_type
            );
        } else {
            let _ = writeln!(out, "  AND {e}.successor_fact_id = {succ_alias}.fact_id");
        }
    }
}

/// Render one `NOT EXISTS` branch as a correlated subquery. `outer_written`
/// identifies which outer aliases the branch may correlate against; its own
/// facts get a nested alias prefix so they never collide with the outer
/// query's aliases.
fn render_not_exists(out: &mut String, depth: usize, branch: &NotExistsCondition) {
    let prefix = format!("n{depth}_");
    let pad = "  ".repeat(depth);
    let _ = writeln!(out, "{pad}AND NOT EXISTS (");
    let _ = writeln!(out, "{pad}  SELECT 1");
    let mut written = HashSet::new();
    let mut body = String::new();
    if let Some(first) = branch.facts.first() {
        render_joins(
            &mut body,
            &prefix,
            &branch.facts,
            &branch.edges,
            first.fact_index,
            &mut written,
        );
    }
    for line in body.lines() {
        let _ = writeln!(out, "{pad}  {line}");
    }
    if !branch.correlated.is_empty() {
        let _ = writeln!(
            out,
            "{pad}  -- correlated against outer labels: {}",
            branch.correlated.join(", ")
        );
    }
    for nested in &branch.not_exists_conditions {
        render_not_exists(out, depth + 1, nested);
    }
    let _ = writeln!(out, "{pad})");
}

fn render_where_inputs(out: &mut String, query: &QueryDescription) {
    let mut first = true;
    for input in &query.inputs {
        let alias = fact_alias("", input.fact_index);
        if first {
            out.push_str("WHERE ");
            first = false;
        } else {
            out.push_str("  AND ");
        }
        let _ = writeln!(
            out,
            "{alias}.fact_type_id = ${} AND {alias}.hash = ${}",
            input.fact_type_parameter, input.fact_hash_parameter
        );
    }
    if first {
        out.push_str("WHERE TRUE\n");
    }
}

fn render_base(query: &QueryDescription) -> String {
    let mut out = String::new();
    let mut written = HashSet::new();
    if let Some(first_idx) = query.facts.first().map(|f| f.fact_index) {
        render_joins(&mut out, "", &query.facts, &query.edges, first_idx, &mut written);
    }
    render_where_inputs(&mut out, query);
    for branch in &query.not_exists_conditions {
        render_not_exists(&mut out, 1, branch);
    }
    out
}

/// Render the paginated feed query: output hashes plus a descending-sorted
/// bookmark array, filtered to rows strictly past the supplied bookmark.
pub fn feed_sql(query: &QueryDescription, bookmark_param: usize, limit_param: usize) -> String {
    let mut select = String::from("SELECT ");
    let columns: Vec<String> = query
        .outputs
        .iter()
        .map(|o| format!("{}.hash AS hash_{}", fact_alias("", o.fact_index), o.label))
        .collect();
    select.push_str(&columns.join(", "));
    if !columns.is_empty() {
        select.push_str(", ");
    }
    let ids: Vec<String> = query
        .outputs
        .iter()
        .map(|o| format!("{}.fact_id", fact_alias("", o.fact_index)))
        .collect();
    let _ = write!(
        select,
        "sort(array[{}], 'desc') AS bookmark",
        ids.join(", ")
    );

    let mut out = format!("{select}\n");
    out.push_str(&render_base(query));
    let _ = writeln!(out, "  AND bookmark > ${bookmark_param}");
    out.push_str("ORDER BY bookmark ASC\n");
    let _ = writeln!(out, "LIMIT ${limit_param}");
    out
}

/// Render the unpaginated result query: full projection data per output, no
/// bookmark or limit.
pub fn result_sql(query: &QueryDescription) -> String {
    let mut select = String::from("SELECT ");
    let columns: Vec<String> = query
        .outputs
        .iter()
        .map(|o| {
            let alias = fact_alias("", o.fact_index);
            format!("{alias}.hash AS hash_{0}, {alias}.data AS data_{0}", o.label)
        })
        .collect();
    select.push_str(&columns.join(", "));

    let mut out = format!("{select}\n");
    out.push_str(&render_base(query));
    out
}
