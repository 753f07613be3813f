//! Authorization evaluation (§4.6).
//!
//! `is_authorized` answers "may `submitter` author this candidate fact?" by
//! splitting the matching rule specification at its first successor step
//! (§4.7): the predecessor-only *head* runs against the submitted fact graph
//! (the candidate plus whatever predecessors the client sent along), the
//! successor-bearing *tail* runs against the persistent store.
//! `get_authorized_population` answers "which of these candidate keys may
//! ever receive a fact of this type?" for the distribution engine.

use std::collections::HashSet;

use crate::error::{CoreError, CoreResult};
use crate::fact::{FactReference, FactType};
use crate::model::Model;
use crate::source::FactSource;
use crate::specification::runner::{self, ProjectedValue, SingularValue};
use crate::specification::{Label, Specification};
use crate::split::split_before_first_successor;

use super::rules::{AuthorizationRule, AuthorizationRules};

/// A resolved user/device fact, per §9's single explicit shape (replacing the
/// original's two divergent head/tail field-access paths).
#[derive(Clone, Debug, PartialEq)]
pub struct UserProjection {
    pub reference: FactReference,
    pub public_key: String,
}

pub(crate) async fn resolve_user_projections<S: FactSource + ?Sized>(
    source: &S,
    model: &Model,
    spec: &Specification,
    start: &[(Label, FactReference)],
) -> CoreResult<Vec<UserProjection>> {
    let results = runner::read(source, model, spec, start).await?;
    let mut out = Vec::with_capacity(results.len());
    for r in results {
        if let ProjectedValue::Singular(SingularValue::Fact(user_ref)) = r.value {
            let hydrated = source.hydrate(&user_ref).await?;
            let public_key = hydrated
                .fields
                .get("publicKey")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            out.push(UserProjection {
                reference: user_ref,
                public_key,
            });
        }
    }
    Ok(out)
}

/// Decide whether `submitter` is authorized to create `candidate`, a fact of
/// `candidate_type`. `submitted` is the in-memory graph of the candidate
/// fact plus whatever predecessors the client included; `store` is the
/// persistent fact store.
pub async fn is_authorized<Sub, Store>(
    model: &Model,
    rules: &AuthorizationRules,
    submitted: &Sub,
    store: &Store,
    candidate_type: &FactType,
    candidate: &FactReference,
    submitter: &FactReference,
) -> CoreResult<bool>
where
    Sub: FactSource + ?Sized,
    Store: FactSource + ?Sized,
{
    for rule in rules.rules_for(candidate_type) {
        match rule {
            AuthorizationRule::Any => return Ok(true),
            AuthorizationRule::None => continue,
            AuthorizationRule::Specification(spec) => {
                if check_rule(model, spec, submitted, store, candidate, submitter).await? {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

async fn check_rule<Sub, Store>(
    model: &Model,
    spec: &Specification,
    submitted: &Sub,
    store: &Store,
    candidate: &FactReference,
    submitter: &FactReference,
) -> CoreResult<bool>
where
    Sub: FactSource + ?Sized,
    Store: FactSource + ?Sized,
{
    let given_name = spec
        .given
        .first()
        .ok_or_else(|| CoreError::MalformedSpecification("authorization rule has no given".to_string()))?
        .name
        .clone();
    let split = split_before_first_successor(spec);

    match (split.head, split.tail) {
        (Some(head), None) => {
            let users =
                resolve_user_projections(submitted, model, &head, &[(given_name, candidate.clone())]).await?;
            Ok(users.iter().any(|u| &u.reference == submitter))
        }
        (None, Some(tail)) => {
            // Split bailed out (§4.7): best-effort, run the whole rule
            // against the store with the candidate bound as its given.
            let users = resolve_user_projections(store, model, &tail, &[(given_name, candidate.clone())]).await?;
            Ok(users.iter().any(|u| &u.reference == submitter))
        }
        (Some(head), Some(tail)) => {
            let head_rows = runner::read(submitted, model, &head, &[(given_name, candidate.clone())]).await?;
            for row in head_rows {
                let tail_start: Vec<(Label, FactReference)> = tail
                    .given
                    .iter()
                    .filter_map(|g| row.tuple.get(&g.name).map(|r| (g.name.clone(), r.clone())))
                    .collect();
                if tail_start.len() != tail.given.len() {
                    continue;
                }
                let users = resolve_user_projections(store, model, &tail, &tail_start).await?;
                if users.iter().any(|u| &u.reference == submitter) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (None, None) => Ok(false),
    }
}

/// Which of `candidate_keys` may receive a fact of `candidate_type` rooted
/// at `candidate` (§4.6).
pub async fn get_authorized_population<Store>(
    model: &Model,
    rules: &AuthorizationRules,
    store: &Store,
    candidate_type: &FactType,
    candidate: &FactReference,
    candidate_keys: &[String],
) -> CoreResult<Vec<String>>
where
    Store: FactSource + ?Sized,
{
    let mut authorized: HashSet<String> = HashSet::new();
    for rule in rules.rules_for(candidate_type) {
        match rule {
            AuthorizationRule::Any => authorized.extend(candidate_keys.iter().cloned()),
            AuthorizationRule::None => {}
            AuthorizationRule::Specification(spec) => {
                let given_name = spec.given.first().map(|g| g.name.clone()).unwrap_or_default();
                let users =
                    resolve_user_projections(store, model, spec, &[(given_name, candidate.clone())]).await?;
                let candidate_set: HashSet<&str> = candidate_keys.iter().map(String::as_str).collect();
                for u in users {
                    if candidate_set.contains(u.public_key.as_str()) {
                        authorized.insert(u.public_key);
                    }
                }
            }
        }
    }
    Ok(authorized.into_iter().collect())
}
