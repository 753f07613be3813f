//! Distribution engine (§4.8).
//!
//! Mirrors authorization over feeds: each [`DistributionRule`] names the
//! fact type a requested feed is rooted at and a `to` specification whose
//! projection names the users permitted to receive it. `check_distribution`
//! walks the requested feeds and ORs their matching rules exactly as
//! [`super::engine::get_authorized_population`] does, failing on the first
//! feed with no permitting rule.
//!
//! §9 open question: the distilled spec describes `predicate` as "a
//! Specification over candidate feed shapes" — resolving which feeds a rule
//! applies to structurally. This core resolves that with the feed's root
//! fact type instead of a full specification-over-shapes match, which would
//! require reifying `QueryDescription` itself as fact data; see DESIGN.md.

use crate::error::{CoreError, CoreResult};
use crate::fact::{FactReference, FactType};
use crate::feed::Feed;
use crate::model::Model;
use crate::source::FactSource;
use crate::specification::{Label, Specification};

use super::engine::resolve_user_projections;

/// One distribution rule: fact type `fact_type` may be distributed to users
/// resolved by `to`.
#[derive(Clone, Debug, PartialEq)]
pub struct DistributionRule {
    pub fact_type: FactType,
    pub to: Specification,
}

#[derive(Clone, Debug, Default)]
pub struct DistributionRules {
    rules: Vec<DistributionRule>,
}

impl DistributionRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn share(mut self, fact_type: impl Into<FactType>, to: Specification) -> Self {
        self.rules.push(DistributionRule {
            fact_type: fact_type.into(),
            to,
        });
        self
    }

    fn rules_for<'a>(&'a self, fact_type: &'a str) -> impl Iterator<Item = &'a DistributionRule> {
        self.rules.iter().filter(move |r| r.fact_type == fact_type)
    }

    /// The `to` specifications of every rule registered for `fact_type`, for
    /// rendering (§6.5).
    pub(crate) fn specs_for<'a>(&'a self, fact_type: &'a str) -> impl Iterator<Item = &'a Specification> {
        self.rules_for(fact_type).map(|r| &r.to)
    }
}

fn feed_root_type(feed: &Feed) -> Option<FactType> {
    let input = feed.query.inputs.first()?;
    feed.query
        .facts
        .iter()
        .find(|f| f.fact_index == input.fact_index)
        .map(|f| f.fact_type.clone())
}

/// Check whether `requester` (identified by `requester_public_key`) may
/// receive every feed in `feeds`, each seeded by the matching entry in
/// `start`. Fails on the first feed no rule permits.
pub async fn check_distribution<Store>(
    model: &Model,
    rules: &DistributionRules,
    store: &Store,
    feeds: &[Feed],
    start: &[(Label, FactReference)],
    requester_public_key: &str,
) -> CoreResult<()>
where
    Store: FactSource + ?Sized,
{
    for feed in feeds {
        let Some(fact_type) = feed_root_type(feed) else {
            continue;
        };
        let mut permitted = false;
        for rule in rules.rules_for(&fact_type) {
            let given_name = rule.to.given.first().map(|g| g.name.clone()).unwrap_or_default();
            let bound_start: Vec<(Label, FactReference)> = start
                .iter()
                .filter(|(name, _)| *name == given_name)
                .cloned()
                .collect();
            let users = resolve_user_projections(store, model, &rule.to, &bound_start).await?;
            if users.iter().any(|u| u.public_key == requester_public_key) {
                permitted = true;
                break;
            }
        }
        if !permitted {
            return Err(CoreError::DistributionDenied {
                reason: format!("no distribution rule permits feed for type '{fact_type}'"),
            });
        }
    }
    Ok(())
}
