//! # Fluent specification builder (§9 design note)
//!
//! The original source builds labels by dynamic property interception
//! (a proxy lazily recording a role path). Here that becomes an explicit
//! typed builder: `.predecessor(role, type)` extends a path, `.field(name)` /
//! `.hash()` / `.fact()` terminate it as a projection. The emitted
//! [`Specification`] value is identical in shape to what the fluent DSL
//! would have produced; only the call-site ergonomics differ.

use super::{
    Component, Condition, Given, Match, NamedComponent, Projection, Quantifier, Role,
    SingularProjection, Specification, SpecificationProjection, UnknownDecl,
};
use crate::fact::FactType;

/// A reference to a label, used as the starting point for `.predecessor(..)`
/// chains when building `Path` conditions.
#[derive(Clone, Debug)]
pub struct LabelRef(pub(crate) String);

impl LabelRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn field(&self, name: impl Into<String>) -> SingularProjection {
        SingularProjection::Field(self.0.clone(), name.into())
    }

    pub fn hash(&self) -> SingularProjection {
        SingularProjection::Hash(self.0.clone())
    }

    pub fn fact(&self) -> SingularProjection {
        SingularProjection::Fact(self.0.clone())
    }
}

/// Helper for constructing a `Role`.
pub fn role(name: impl Into<String>, predecessor_type: impl Into<FactType>) -> Role {
    Role::new(name, predecessor_type)
}

/// Build a `Path` condition: walking `roles_left` from the owning
/// given/unknown equals walking `roles_right` from `label_right`.
pub fn path(roles_left: Vec<Role>, label_right: &LabelRef, roles_right: Vec<Role>) -> Condition {
    Condition::Path {
        roles_left,
        label_right: label_right.0.clone(),
        roles_right,
    }
}

/// A direct predecessor reference: `unknown == label_right->roles_right`.
pub fn predecessor(label_right: &LabelRef, roles_right: Vec<Role>) -> Condition {
    path(Vec::new(), label_right, roles_right)
}

/// A direct successor reference: `unknown->roles_left == label_right`.
pub fn successor(roles_left: Vec<Role>, label_right: &LabelRef) -> Condition {
    path(roles_left, label_right, Vec::new())
}

/// Build a standalone `Match`, for composing the match lists inside
/// `exists`/`not_exists` without going through a full `SpecificationBuilder`.
pub fn one_match(name: impl Into<String>, fact_type: impl Into<FactType>, conditions: Vec<Condition>) -> Match {
    Match {
        unknown: UnknownDecl {
            name: name.into(),
            fact_type: fact_type.into(),
        },
        conditions,
    }
}

pub fn exists(matches: Vec<Match>) -> Condition {
    Condition::Existential {
        quantifier: Quantifier::ExistsAll,
        matches,
    }
}

pub fn not_exists(matches: Vec<Match>) -> Condition {
    Condition::Existential {
        quantifier: Quantifier::NotExists,
        matches,
    }
}

/// Builds up `given`/`matches` lists before being finalized with `.project(..)`.
#[derive(Default)]
pub struct SpecificationBuilder {
    given: Vec<Given>,
    matches: Vec<Match>,
}

impl SpecificationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn given(mut self, name: impl Into<String>, fact_type: impl Into<FactType>) -> Self {
        self.given.push(Given {
            name: name.into(),
            fact_type: fact_type.into(),
            conditions: Vec::new(),
        });
        self
    }

    pub fn given_where(
        mut self,
        name: impl Into<String>,
        fact_type: impl Into<FactType>,
        conditions: Vec<Condition>,
    ) -> Self {
        self.given.push(Given {
            name: name.into(),
            fact_type: fact_type.into(),
            conditions,
        });
        self
    }

    pub fn matching(
        mut self,
        name: impl Into<String>,
        fact_type: impl Into<FactType>,
        conditions: Vec<Condition>,
    ) -> Self {
        self.matches.push(Match {
            unknown: UnknownDecl {
                name: name.into(),
                fact_type: fact_type.into(),
            },
            conditions,
        });
        self
    }

    pub fn project(self, projection: Projection) -> Specification {
        Specification {
            given: self.given,
            matches: self.matches,
            projection,
        }
    }

    /// Convenience for the common case: the full tuple's `unknown` fact, no
    /// composite wrapping.
    pub fn project_fact(self, label: impl Into<String>) -> Specification {
        self.project(Projection::Singular(SingularProjection::Fact(
            label.into(),
        )))
    }
}

pub fn composite(components: Vec<(&str, Component)>) -> Projection {
    Projection::Composite(
        components
            .into_iter()
            .map(|(name, component)| NamedComponent {
                name: name.to_string(),
                component,
            })
            .collect(),
    )
}

pub fn nested(matches: Vec<Match>, projection: Projection) -> Component {
    Component::Specification(Box::new(SpecificationProjection { matches, projection }))
}

pub fn field(singular: SingularProjection) -> Component {
    Component::Singular(singular)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::Projection;

    #[test]
    fn builds_simple_given_to_match_spec() {
        let o = LabelRef::new("o");
        let spec = SpecificationBuilder::new()
            .given("o", "Office")
            .matching(
                "e",
                "Employee",
                vec![successor(vec![role("office", "Office")], &o)],
            )
            .project_fact("e");

        assert_eq!(spec.given.len(), 1);
        assert_eq!(spec.matches.len(), 1);
        assert!(matches!(spec.projection, Projection::Singular(_)));
    }
}
