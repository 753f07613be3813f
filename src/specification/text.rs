//! # Canonical textual rendering (§6.5)
//!
//! Renders a [`Specification`] as the human-readable description format used
//! in logs, authorization-rule dumps, and feed debugging output. The shape
//! mirrors the algebra directly: one line per given, one block per match, a
//! trailing projection.

use std::fmt::Write as _;

use super::{
    Component, Condition, Given, Match, Projection, Quantifier, Role, SingularProjection,
    Specification,
};

fn write_roles(out: &mut String, label: &str, roles: &[Role]) {
    out.push_str(label);
    for role in roles {
        let _ = write!(out, "->{}", role.name);
    }
}

fn write_condition(out: &mut String, indent: usize, unknown: &str, cond: &Condition) {
    let pad = "    ".repeat(indent);
    match cond {
        Condition::Path {
            roles_left,
            label_right,
            roles_right,
        } => {
            out.push_str(&pad);
            write_roles(out, unknown, roles_left);
            out.push_str(" = ");
            write_roles(out, label_right, roles_right);
            out.push('\n');
        }
        Condition::Existential { quantifier, matches } => {
            let keyword = match quantifier {
                Quantifier::ExistsAll => "exists",
                Quantifier::NotExists => "not exists",
            };
            let _ = writeln!(out, "{pad}{keyword} {{");
            for m in matches {
                write_match(out, indent + 1, m);
            }
            let _ = writeln!(out, "{pad}}}");
        }
    }
}

fn write_match(out: &mut String, indent: usize, m: &Match) {
    let pad = "    ".repeat(indent);
    let _ = writeln!(out, "{pad}{}: {} [", m.unknown.name, m.unknown.fact_type);
    for cond in &m.conditions {
        write_condition(out, indent + 1, &m.unknown.name, cond);
    }
    let _ = writeln!(out, "{pad}]");
}

fn write_given(out: &mut String, g: &Given) {
    let _ = writeln!(out, "({}: {}) {{", g.name, g.fact_type);
    for cond in &g.conditions {
        write_condition(out, 1, &g.name, cond);
    }
}

fn write_singular(out: &mut String, proj: &SingularProjection) {
    match proj {
        SingularProjection::Fact(label) => out.push_str(label),
        SingularProjection::Hash(label) => {
            let _ = write!(out, "#{label}");
        }
        SingularProjection::Field(label, field) => {
            let _ = write!(out, "{label}.{field}");
        }
    }
}

fn write_projection(out: &mut String, indent: usize, projection: &Projection) {
    let pad = "    ".repeat(indent);
    match projection {
        Projection::Singular(s) => {
            out.push_str(&pad);
            write_singular(out, s);
            out.push('\n');
        }
        Projection::Composite(components) => {
            let _ = writeln!(out, "{pad}{{");
            for nc in components {
                let inner_pad = "    ".repeat(indent + 1);
                match &nc.component {
                    Component::Singular(s) => {
                        out.push_str(&inner_pad);
                        let _ = write!(out, "{}: ", nc.name);
                        write_singular(out, s);
                        out.push('\n');
                    }
                    Component::Specification(sp) => {
                        let _ = writeln!(out, "{inner_pad}{}: {{", nc.name);
                        for m in &sp.matches {
                            write_match(out, indent + 2, m);
                        }
                        write_projection(out, indent + 2, &sp.projection);
                        let _ = writeln!(out, "{inner_pad}}}");
                    }
                }
            }
            let _ = writeln!(out, "{pad}}}");
        }
    }
}

/// Render `spec` in the canonical textual form.
pub fn render(spec: &Specification) -> String {
    let mut out = String::new();
    for g in &spec.given {
        write_given(&mut out, g);
    }
    for m in &spec.matches {
        write_match(&mut out, 1, m);
    }
    write_projection(&mut out, 1, &spec.projection);
    for _ in &spec.given {
        out.push_str("}\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::builder::*;

    #[test]
    fn renders_given_match_projection() {
        let o = LabelRef::new("o");
        let spec = SpecificationBuilder::new()
            .given("o", "Office")
            .matching(
                "e",
                "Employee",
                vec![successor(vec![role("office", "Office")], &o)],
            )
            .project_fact("e");

        let text = render(&spec);
        assert!(text.contains("(o: Office) {"));
        assert!(text.contains("e: Employee ["));
        assert!(text.contains("e->office = o"));
        assert!(text.trim_end().ends_with('}'));
    }

    #[test]
    fn renders_not_exists_block() {
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
            .project_fact("o");

        let text = render(&spec);
        assert!(text.contains("not exists {"));
        assert!(text.contains("c: Office.Closed ["));
    }
}
