//! # Fact data model
//!
//! A [`Fact`] is a content-addressed, immutable record: a type name, a map of
//! scalar fields, and a map of predecessor edges keyed by role name. Facts are
//! never mutated after construction — equality and hashing follow `(type,
//! hash)` identity only (§3).
//!
//! Computing the canonical hash/signature of a fact is explicitly out of
//! scope for this core (the envelope format is an external collaborator).
//! [`reference_hash`] below is a minimal SHA-256-based stand-in used only so
//! in-repo tests and examples can build self-consistent fixtures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type FactType = String;
pub type RoleName = String;
pub type Hash = String;

/// A reference to a fact by content address: its type and hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactReference {
    #[serde(rename = "type")]
    pub fact_type: FactType,
    pub hash: Hash,
}

impl FactReference {
    pub fn new(fact_type: impl Into<FactType>, hash: impl Into<Hash>) -> Self {
        Self {
            fact_type: fact_type.into(),
            hash: hash.into(),
        }
    }
}

impl std::fmt::Display for FactReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.fact_type, self.hash)
    }
}

/// A role's value: either a single predecessor or an ordered collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Predecessors {
    Single(FactReference),
    Many(Vec<FactReference>),
}

impl Predecessors {
    /// Flatten to a slice of references regardless of single/many shape.
    pub fn as_refs(&self) -> Vec<&FactReference> {
        match self {
            Predecessors::Single(r) => vec![r],
            Predecessors::Many(rs) => rs.iter().collect(),
        }
    }
}

/// An immutable, content-addressed fact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    #[serde(rename = "type")]
    pub fact_type: FactType,
    pub hash: Hash,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub predecessors: BTreeMap<RoleName, Predecessors>,
}

impl Fact {
    pub fn reference(&self) -> FactReference {
        FactReference::new(self.fact_type.clone(), self.hash.clone())
    }

    /// Predecessor references for `role`, empty if the role is unset.
    pub fn predecessors_for(&self, role: &str) -> Vec<FactReference> {
        self.predecessors
            .get(role)
            .map(|p| p.as_refs().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

/// Deterministic content hash over type, fields, and predecessors, used by
/// tests/fixtures that need self-consistent facts. Not the production
/// hashing/signing algorithm (out of scope, §1).
pub fn reference_hash(
    fact_type: &str,
    fields: &BTreeMap<String, serde_json::Value>,
    predecessors: &BTreeMap<RoleName, Predecessors>,
) -> Hash {
    let canonical = serde_json::json!({
        "type": fact_type,
        "fields": fields,
        "predecessors": predecessors,
    });
    let bytes = serde_json::to_vec(&canonical).expect("canonical json always serializes");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

/// Convenience constructor that computes the hash for you.
pub fn new_fact(
    fact_type: impl Into<FactType>,
    fields: BTreeMap<String, serde_json::Value>,
    predecessors: BTreeMap<RoleName, Predecessors>,
) -> Fact {
    let fact_type = fact_type.into();
    let hash = reference_hash(&fact_type, &fields, &predecessors);
    Fact {
        fact_type,
        hash,
        fields,
        predecessors,
    }
}
