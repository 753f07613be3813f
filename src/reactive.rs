//! # Reactive pipeline (§5)
//!
//! `InverseSpecificationEngine` holds a registry of `(specification,
//! callback)` listeners (backed by `dashmap`, matching the teacher's
//! index/registry style). Registration derives every [`SpecificationInverse`]
//! for the listened specification (§4.5) and indexes them by root fact type
//! so `notify_fact_added` can dispatch in O(1) per newly-saved fact. Callbacks
//! fire in registration order; a subscriber's tokens are tracked so
//! `deregister_subscriber` can release all of them deterministically on
//! disconnect.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::fact::{FactReference, FactType};
use crate::feed::FeedId;
use crate::inverter::{self, Operation, SpecificationInverse};
use crate::model::Model;
use crate::source::FactSource;
use crate::specification::runner::{self, ProjectedResult};
use crate::specification::Specification;
use crate::storage::{Bookmark, BookmarkManager};

pub type ListenerToken = Uuid;

/// Invoked once per matching inverse evaluation, with the operation it
/// represents and the projected results from running it against the newly
/// saved fact.
pub type Callback = Arc<dyn Fn(Operation, Vec<ProjectedResult>) + Send + Sync>;

struct Registration {
    subscriber: String,
    order: u64,
    inverses: Vec<SpecificationInverse>,
    callback: Callback,
}

fn inverse_root_type(inv: &SpecificationInverse) -> Option<&FactType> {
    inv.inverse_specification.given.first().map(|g| &g.fact_type)
}

#[derive(Default)]
pub struct InverseSpecificationEngine {
    listeners: DashMap<ListenerToken, Registration>,
    by_subscriber: DashMap<String, Vec<ListenerToken>>,
    by_fact_type: DashMap<FactType, Vec<ListenerToken>>,
    sequence: AtomicU64,
}

impl InverseSpecificationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `spec` on behalf of `subscriber`. Returns an opaque token for
    /// later deregistration.
    pub fn register(
        &self,
        model: &Model,
        subscriber: impl Into<String>,
        spec: &Specification,
        callback: Callback,
    ) -> ListenerToken {
        let inverses = inverter::invert(model, spec);
        let token = Uuid::new_v4();
        let order = self.sequence.fetch_add(1, Ordering::SeqCst);
        let subscriber = subscriber.into();

        let mut fact_types: Vec<FactType> = inverses.iter().filter_map(inverse_root_type).cloned().collect();
        fact_types.sort();
        fact_types.dedup();
        for fact_type in &fact_types {
            self.by_fact_type.entry(fact_type.clone()).or_default().push(token);
        }
        self.by_subscriber.entry(subscriber.clone()).or_default().push(token);
        self.listeners.insert(
            token,
            Registration {
                subscriber,
                order,
                inverses,
                callback,
            },
        );
        token
    }

    /// Release a single listener's token and every index entry for it.
    pub fn deregister(&self, token: ListenerToken) {
        let Some((_, reg)) = self.listeners.remove(&token) else {
            return;
        };
        if let Some(mut tokens) = self.by_subscriber.get_mut(&reg.subscriber) {
            tokens.retain(|t| *t != token);
        }
        let mut fact_types: Vec<FactType> = reg.inverses.iter().filter_map(inverse_root_type).cloned().collect();
        fact_types.sort();
        fact_types.dedup();
        for fact_type in fact_types {
            if let Some(mut tokens) = self.by_fact_type.get_mut(&fact_type) {
                tokens.retain(|t| *t != token);
            }
        }
    }

    /// Release every token `subscriber` ever registered (disconnect, §5).
    pub fn deregister_subscriber(&self, subscriber: &str) {
        let Some((_, tokens)) = self.by_subscriber.remove(subscriber) else {
            return;
        };
        for token in tokens {
            self.deregister(token);
        }
    }

    /// Evaluate every listener whose inverse is rooted at `fact`'s type,
    /// seeded by `fact`, against `source`, invoking callbacks in registration
    /// order (§5).
    pub async fn notify_fact_added<S: FactSource + ?Sized>(
        &self,
        model: &Model,
        source: &S,
        fact: &FactReference,
    ) -> CoreResult<()> {
        let Some(tokens) = self.by_fact_type.get(&fact.fact_type).map(|v| v.clone()) else {
            return Ok(());
        };

        let mut ordered: Vec<(u64, ListenerToken)> = tokens
            .into_iter()
            .filter_map(|t| self.listeners.get(&t).map(|r| (r.order, t)))
            .collect();
        ordered.sort_by_key(|(order, _)| *order);

        for (_, token) in ordered {
            let Some(entry) = self.listeners.get(&token) else {
                continue;
            };
            let callback = entry.callback.clone();
            let matching: Vec<SpecificationInverse> = entry
                .inverses
                .iter()
                .filter(|inv| inverse_root_type(inv) == Some(&fact.fact_type))
                .cloned()
                .collect();
            drop(entry);

            for inv in matching {
                let given_name = inv.inverse_specification.given[0].name.clone();
                let results = runner::read(source, model, &inv.inverse_specification, &[(given_name, fact.clone())])
                    .await?;
                callback(inv.operation, results);
            }
        }
        Ok(())
    }
}

/// One bookmark-advancing update for a subscribed feed, per §5's ordering
/// rule: an `add` carries its results (to be emitted as a graph payload)
/// ahead of the bookmark; a `remove` carries none.
pub struct FeedUpdate {
    pub operation: Operation,
    pub results: Vec<ProjectedResult>,
    pub bookmark: Bookmark,
}

/// Allocate the next bookmark for `feed` and package it with `operation`'s
/// results, observing the emit-facts-then-`BOOK` (add) vs. `BOOK`-only
/// (remove) ordering the protocol layer must follow.
pub fn advance_feed(
    bookmarks: &BookmarkManager,
    feed: FeedId,
    operation: Operation,
    results: Vec<ProjectedResult>,
) -> FeedUpdate {
    let bookmark = bookmarks.advance(feed);
    let results = match operation {
        Operation::Add => results,
        Operation::Remove => Vec::new(),
    };
    FeedUpdate {
        operation,
        results,
        bookmark,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::{new_fact, Predecessors};
    use crate::source::InMemoryGraph;
    use crate::specification::builder::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn closed_office_spec() -> Specification {
        let o = LabelRef::new("o");
        SpecificationBuilder::new()
            .given_where(
                "o",
                "Office",
                vec![not_exists(vec![one_match(
                    "c",
                    "Office.Closed",
                    vec![successor(vec![role("office", "Office")], &o)],
                )])],
            )
            .project_fact("o")
    }

    #[tokio::test]
    async fn closing_an_office_fires_a_remove_callback() {
        let model = Model::new().role("Office.Closed", "office", "Office");
        let engine = InverseSpecificationEngine::new();

        let seen: Arc<Mutex<Vec<Operation>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let callback: Callback = Arc::new(move |op, _results| {
            seen_clone.lock().unwrap().push(op);
        });

        engine.register(&model, "subscriber-1", &closed_office_spec(), callback);

        let office = new_fact("Office", BTreeMap::new(), BTreeMap::new());
        let office_ref = office.reference();
        let mut preds = BTreeMap::new();
        preds.insert("office".to_string(), Predecessors::Single(office_ref.clone()));
        let closed = new_fact("Office.Closed", BTreeMap::new(), preds);
        let closed_ref = closed.reference();

        let mut source = InMemoryGraph::new();
        source.insert(office);
        source.insert(closed);

        engine.notify_fact_added(&model, &source, &closed_ref).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Operation::Remove]);
    }

    #[tokio::test]
    async fn unrelated_fact_type_triggers_nothing() {
        let model = Model::new().role("Office.Closed", "office", "Office");
        let engine = InverseSpecificationEngine::new();
        let fired = Arc::new(Mutex::new(false));
        let fired_clone = fired.clone();
        let callback: Callback = Arc::new(move |_, _| {
            *fired_clone.lock().unwrap() = true;
        });
        engine.register(&model, "subscriber-1", &closed_office_spec(), callback);

        let source = InMemoryGraph::new();
        let unrelated = FactReference::new("Employee", "e1");
        engine.notify_fact_added(&model, &source, &unrelated).await.unwrap();

        assert!(!*fired.lock().unwrap());
    }

    #[test]
    fn deregister_subscriber_clears_its_tokens() {
        let model = Model::new().role("Office.Closed", "office", "Office");
        let engine = InverseSpecificationEngine::new();
        let callback: Callback = Arc::new(|_, _| {});
        let token = engine.register(&model, "subscriber-1", &closed_office_spec(), callback);

        engine.deregister_subscriber("subscriber-1");
        assert!(engine.listeners.get(&token).is_none());
        assert!(engine.by_fact_type.get("Office.Closed").is_none());
    }

    #[test]
    fn advance_feed_drops_results_for_remove() {
        let bookmarks = BookmarkManager::new();
        let update = advance_feed(&bookmarks, "feed-1".to_string(), Operation::Remove, vec![]);
        assert!(update.results.is_empty());
        assert!(!update.bookmark.is_empty());
    }
}
