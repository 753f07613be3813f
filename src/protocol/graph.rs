//! # Graph serialization (§6.4)
//!
//! A single forward stream of records: public-key declarations and fact
//! declarations. Facts reference their predecessors and signers by 0-based
//! index into the stream rather than repeating content, so [`GraphWriter`]
//! and [`GraphReader`] must be driven in the same order the producer wrote
//! records. Duplicate facts (same `type:hash`) are skipped on write and
//! their existing index reused; same for duplicate public keys.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::fact::{reference_hash, Fact, FactReference, Predecessors, RoleName};
use crate::storage::FactEnvelope;

/// A predecessor reference within the stream, by 0-based fact index —
/// single or array, mirroring [`Predecessors`]'s own shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum IndexRef {
    Single(usize),
    Many(Vec<usize>),
}

/// Incrementally serializes public keys and facts into the stream format,
/// assigning each distinct one a stream index the moment it's first
/// written.
#[derive(Default)]
pub struct GraphWriter {
    fact_indices: HashMap<FactReference, usize>,
    key_indices: HashMap<String, usize>,
}

impl GraphWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a `PK{n}` declaration, or `None` if `public_key` was already
    /// written.
    pub fn write_public_key(&mut self, public_key: &str) -> CoreResult<Option<String>> {
        if self.key_indices.contains_key(public_key) {
            return Ok(None);
        }
        let index = self.key_indices.len();
        self.key_indices.insert(public_key.to_string(), index);
        let json = serde_json::to_string(public_key)?;
        Ok(Some(format!("PK{index}\n{json}\n\n")))
    }

    /// Emit a fact declaration. `signers` names the public keys
    /// (already written via [`Self::write_public_key`]) each of
    /// `envelope.signatures` was produced by, in order. Every predecessor
    /// referenced by the fact must already have been written. Returns
    /// `None` if the fact was already written.
    pub fn write_fact(&mut self, envelope: &FactEnvelope, signers: &[String]) -> CoreResult<Option<String>> {
        let reference = envelope.fact.reference();
        if self.fact_indices.contains_key(&reference) {
            return Ok(None);
        }
        if signers.len() != envelope.signatures.len() {
            return Err(CoreError::MalformedSpecification(
                "signer list length must match signature count".to_string(),
            ));
        }

        let mut predecessor_map: BTreeMap<RoleName, IndexRef> = BTreeMap::new();
        for (role, preds) in &envelope.fact.predecessors {
            let indices: Vec<usize> = preds
                .as_refs()
                .into_iter()
                .map(|r| self.resolve_fact_index(r))
                .collect::<CoreResult<_>>()?;
            let index_ref = match preds {
                Predecessors::Single(_) => IndexRef::Single(indices[0]),
                Predecessors::Many(_) => IndexRef::Many(indices),
            };
            predecessor_map.insert(role.clone(), index_ref);
        }

        let type_json = serde_json::to_string(&envelope.fact.fact_type)?;
        let pred_json = serde_json::to_string(&predecessor_map)?;
        let fields_json = serde_json::to_string(&envelope.fact.fields)?;

        let mut out = format!("{type_json}\n{pred_json}\n{fields_json}\n");
        for (signature, signer) in envelope.signatures.iter().zip(signers) {
            let key_index = self.resolve_key_index(signer)?;
            let sig_json = serde_json::to_string(signature)?;
            out.push_str(&format!("PK{key_index}\n{sig_json}\n"));
        }
        out.push('\n');

        let index = self.fact_indices.len();
        self.fact_indices.insert(reference, index);
        Ok(Some(out))
    }

    fn resolve_fact_index(&self, reference: &FactReference) -> CoreResult<usize> {
        self.fact_indices
            .get(reference)
            .copied()
            .ok_or_else(|| CoreError::MalformedSpecification(format!("predecessor {reference} not yet written to stream")))
    }

    fn resolve_key_index(&self, public_key: &str) -> CoreResult<usize> {
        self.key_indices
            .get(public_key)
            .copied()
            .ok_or_else(|| {
                CoreError::MalformedSpecification(format!("public key '{public_key}' not yet written to stream"))
            })
    }
}

/// Reconstructs facts and public keys from a stream written by
/// [`GraphWriter`], resolving predecessor/signer indices as each record is
/// read, in the same order they were written.
#[derive(Default)]
pub struct GraphReader {
    facts: Vec<FactReference>,
    keys: Vec<String>,
}

impl GraphReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_public_key(&mut self, json_line: &str) -> CoreResult<()> {
        let key: String = serde_json::from_str(json_line)?;
        self.keys.push(key);
        Ok(())
    }

    /// Reconstruct one fact declaration from its JSON lines plus any
    /// trailing `(PKref, signature)` pairs.
    pub fn read_fact(
        &mut self,
        type_json: &str,
        predecessor_json: &str,
        fields_json: &str,
        signature_lines: &[(usize, String)],
    ) -> CoreResult<FactEnvelope> {
        let fact_type: String = serde_json::from_str(type_json)?;
        let predecessor_map: BTreeMap<RoleName, IndexRef> = serde_json::from_str(predecessor_json)?;
        let fields = serde_json::from_str(fields_json)?;

        let mut predecessors = BTreeMap::new();
        for (role, index_ref) in predecessor_map {
            let resolved = match index_ref {
                IndexRef::Single(i) => Predecessors::Single(self.resolve_fact(i)?),
                IndexRef::Many(is) => {
                    let rs = is.iter().map(|i| self.resolve_fact(*i)).collect::<CoreResult<Vec<_>>>()?;
                    Predecessors::Many(rs)
                }
            };
            predecessors.insert(role, resolved);
        }

        let hash = reference_hash(&fact_type, &fields, &predecessors);
        let fact = Fact {
            fact_type,
            hash,
            fields,
            predecessors,
        };
        let signatures = signature_lines
            .iter()
            .map(|(_, sig)| sig.clone())
            .collect();

        self.facts.push(fact.reference());
        Ok(FactEnvelope { fact, signatures })
    }

    fn resolve_fact(&self, index: usize) -> CoreResult<FactReference> {
        self.facts
            .get(index)
            .cloned()
            .ok_or_else(|| CoreError::MalformedSpecification(format!("predecessor index {index} out of range")))
    }
}
