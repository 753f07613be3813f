//! # Specification AST (§3)
//!
//! The algebra of specifications: givens, matches, conditions, and
//! projections. Values here are immutable once built — the fluent builder in
//! [`builder`] is the only thing that constructs them. `validator`, `runner`,
//! `text`, and the planner/inverter/auth modules all operate on this AST.

pub mod builder;
pub mod runner;
pub mod text;
pub mod validator;

use crate::fact::{FactType, RoleName};

pub type Label = String;

/// A named, type-declared edge slot on a fact type, as walked by a `Path`
/// condition. `predecessor_type` is the type of the fact found by walking
/// this role (the type it points *to*, as declared in the [`crate::model::Model`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Role {
    pub name: RoleName,
    pub predecessor_type: FactType,
}

impl Role {
    pub fn new(name: impl Into<RoleName>, predecessor_type: impl Into<FactType>) -> Self {
        Self {
            name: name.into(),
            predecessor_type: predecessor_type.into(),
        }
    }
}

/// Existential quantifier (§9 design note: two variants rather than a boolean
/// flag, so exhaustive matches can't silently miss a case).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantifier {
    ExistsAll,
    NotExists,
}

/// A condition attached to a given or a match.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// Asserts that walking `roles_left` from the owning unknown equals
    /// walking `roles_right` from `label_right`.
    Path {
        roles_left: Vec<Role>,
        label_right: Label,
        roles_right: Vec<Role>,
    },
    /// A nested sub-specification; satisfied when its matches yield
    /// (`ExistsAll`) or don't yield (`NotExists`) any tuples.
    Existential {
        quantifier: Quantifier,
        matches: Vec<Match>,
    },
}

impl Condition {
    pub fn is_path(&self) -> bool {
        matches!(self, Condition::Path { .. })
    }
}

/// One labeled input position.
#[derive(Clone, Debug, PartialEq)]
pub struct Given {
    pub name: Label,
    pub fact_type: FactType,
    pub conditions: Vec<Condition>,
}

/// The declared identity of a match's unknown.
#[derive(Clone, Debug, PartialEq)]
pub struct UnknownDecl {
    pub name: Label,
    pub fact_type: FactType,
}

/// One pattern-bound position.
#[derive(Clone, Debug, PartialEq)]
pub struct Match {
    pub unknown: UnknownDecl,
    pub conditions: Vec<Condition>,
}

impl Match {
    /// The first condition, which must be a binding `Path` (validator-enforced).
    pub fn binding_path(&self) -> Option<&Condition> {
        self.conditions.first()
    }
}

/// One of the three things a singular projection can read off a label.
#[derive(Clone, Debug, PartialEq)]
pub enum SingularProjection {
    Fact(Label),
    Field(Label, String),
    Hash(Label),
}

impl SingularProjection {
    pub fn label(&self) -> &Label {
        match self {
            SingularProjection::Fact(l) | SingularProjection::Hash(l) => l,
            SingularProjection::Field(l, _) => l,
        }
    }
}

/// A named slot inside a composite projection.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedComponent {
    pub name: String,
    pub component: Component,
}

/// A composite's component: either a plain field/fact/hash read, or a nested
/// specification-projection with its own matches and projection.
#[derive(Clone, Debug, PartialEq)]
pub enum Component {
    Singular(SingularProjection),
    Specification(Box<SpecificationProjection>),
}

/// A nested specification embedded as a projection component.
#[derive(Clone, Debug, PartialEq)]
pub struct SpecificationProjection {
    pub matches: Vec<Match>,
    pub projection: Projection,
}

/// The specification's result shape.
#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    Singular(SingularProjection),
    Composite(Vec<NamedComponent>),
}

/// An immutable, validated (or not-yet-validated) query specification.
#[derive(Clone, Debug, PartialEq)]
pub struct Specification {
    pub given: Vec<Given>,
    pub matches: Vec<Match>,
    pub projection: Projection,
}

impl Specification {
    /// The identity specification: no matches, an empty composite
    /// projection. Exempt from the validator's isolated-label check (§4.1).
    pub fn is_identity(&self) -> bool {
        self.matches.is_empty() && matches!(&self.projection, Projection::Composite(c) if c.is_empty())
    }

    /// A purge specification must have exactly one given and no negative
    /// existentials anywhere in its match tree (§3).
    pub fn is_valid_purge_shape(&self) -> bool {
        self.given.len() == 1 && !contains_not_exists(&self.matches)
    }
}

fn contains_not_exists(matches: &[Match]) -> bool {
    matches.iter().any(|m| {
        m.conditions.iter().any(|c| match c {
            Condition::Existential {
                quantifier: Quantifier::NotExists,
                ..
            } => true,
            Condition::Existential {
                quantifier: Quantifier::ExistsAll,
                matches: inner,
            } => contains_not_exists(inner),
            Condition::Path { .. } => false,
        })
    })
}
