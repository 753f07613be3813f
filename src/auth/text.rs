//! # Authorization/distribution rule rendering (§6.5)
//!
//! Renders [`AuthorizationRules`] and [`DistributionRules`] in the same
//! canonical textual style as [`crate::specification::text::render`], for
//! logs and rule-set dumps.

use std::fmt::Write as _;

use crate::fact::FactType;
use crate::specification::text::render as render_spec;

use super::distribution::DistributionRules;
use super::rules::{AuthorizationRule, AuthorizationRules};

fn indent_block(text: &str, levels: usize) -> String {
    let pad = "    ".repeat(levels);
    text.lines().map(|l| format!("{pad}{l}\n")).collect()
}

/// Render every rule registered for `fact_type` as an `authorization { ... }`
/// block. Multiple rules for a type are ORed, rendered as sibling lines.
pub fn render_authorization(rules: &AuthorizationRules, fact_type: &FactType) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "authorization {fact_type} {{");
    for rule in rules.rules_for(fact_type) {
        match rule {
            AuthorizationRule::Any => {
                let _ = writeln!(out, "    any");
            }
            AuthorizationRule::None => {
                let _ = writeln!(out, "    no");
            }
            AuthorizationRule::Specification(spec) => {
                out.push_str(&indent_block(&render_spec(spec), 1));
            }
        }
    }
    out.push_str("}\n");
    out
}

/// Render every rule registered for `fact_type` as a `distribution { ... }`
/// block: `share <spec> with <userSpec>` per rule.
pub fn render_distribution(rules: &DistributionRules, fact_type: &FactType) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "distribution {fact_type} {{");
    for to in rules.specs_for(fact_type) {
        let _ = writeln!(out, "    share with");
        out.push_str(&indent_block(&render_spec(to), 2));
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::builder::*;

    #[test]
    fn renders_any_and_none_rules() {
        let rules = AuthorizationRules::new().any("Office").none("Office.Closed");
        let text = render_authorization(&rules, &"Office".to_string());
        assert!(text.starts_with("authorization Office {"));
        assert!(text.contains("any"));
    }

    #[test]
    fn renders_specification_rule_indented() {
        let o = LabelRef::new("o");
        let spec = SpecificationBuilder::new()
            .given("o", "Office")
            .matching(
                "creator",
                "User",
                vec![predecessor(&o, vec![role("creator", "User")])],
            )
            .project_fact("creator");
        let rules = AuthorizationRules::new().specification("Office", spec);
        let text = render_authorization(&rules, &"Office".to_string());
        assert!(text.contains("(o: Office)"));
    }

    #[test]
    fn renders_distribution_share_block() {
        let o = LabelRef::new("o");
        let to_spec = SpecificationBuilder::new()
            .given("o", "Office")
            .matching(
                "creator",
                "User",
                vec![predecessor(&o, vec![role("creator", "User")])],
            )
            .project_fact("creator");
        let rules = DistributionRules::new().share("Office", to_spec);
        let text = render_distribution(&rules, &"Office".to_string());
        assert!(text.starts_with("distribution Office {"));
        assert!(text.contains("share with"));
    }
}
