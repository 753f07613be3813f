//! Shared fixtures for integration tests: an in-memory `Storage` built on
//! [`factgraph::source::InMemoryGraph`] plus a couple of small fact-graph
//! builders matching the scenarios in SPEC_FULL.md §8.

use std::collections::BTreeMap;

use async_trait::async_trait;
use factgraph::error::CoreResult;
use factgraph::fact::{new_fact, Fact, FactReference, Predecessors};
use factgraph::model::Model;
use factgraph::source::{FactSource, InMemoryGraph};
use factgraph::specification::runner::{self, ProjectedResult};
use factgraph::specification::{Label, Specification};
use factgraph::storage::{Bookmark, BookmarkManager, FactEnvelope, FeedPage, Storage};

/// An in-memory `Storage`, backed by the same graph as [`InMemoryGraph`],
/// with feed pagination by row offset (sufficient for tests; production
/// storage paginates by the fact-id-derived bookmark described in §4.4).
pub struct MemoryStorage {
    graph: parking_lot::RwLock<InMemoryGraph>,
    bookmarks: BookmarkManager,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            graph: parking_lot::RwLock::new(InMemoryGraph::new()),
            bookmarks: BookmarkManager::new(),
        }
    }

    pub fn insert(&self, fact: Fact) -> FactReference {
        self.graph.write().insert(fact)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save(&self, envelopes: Vec<FactEnvelope>) -> CoreResult<Vec<FactEnvelope>> {
        let mut new_envelopes = Vec::new();
        for envelope in envelopes {
            let snapshot = self.graph.read().clone();
            let already_known = snapshot.find_fact(&envelope.fact.reference()).await?.is_some();
            if !already_known {
                self.graph.write().insert(envelope.fact.clone());
                new_envelopes.push(envelope);
            }
        }
        Ok(new_envelopes)
    }

    async fn read(
        &self,
        model: &Model,
        start: &[(Label, FactReference)],
        spec: &Specification,
    ) -> CoreResult<Vec<ProjectedResult>> {
        let graph = self.graph.read().clone();
        runner::read(&graph, model, spec, start).await
    }

    async fn feed(
        &self,
        model: &Model,
        spec: &Specification,
        start: &[(Label, FactReference)],
        bookmark: Bookmark,
    ) -> CoreResult<FeedPage> {
        let graph = self.graph.read().clone();
        let results = runner::read(&graph, model, spec, start).await?;
        let skip: usize = bookmark.parse().unwrap_or(0);
        let tuples: Vec<Vec<FactReference>> = results
            .into_iter()
            .skip(skip)
            .map(|r| r.tuple.values().cloned().collect())
            .collect();
        let new_bookmark = (skip + tuples.len()).to_string();
        Ok(FeedPage {
            tuples,
            bookmark: new_bookmark,
        })
    }

    async fn load(&self, references: &[FactReference]) -> CoreResult<Vec<FactEnvelope>> {
        let graph = self.graph.read().clone();
        let mut out = Vec::new();
        for r in references {
            if let Some(fact) = graph.find_fact(r).await? {
                out.push(FactEnvelope {
                    fact,
                    signatures: Vec::new(),
                });
            }
        }
        Ok(out)
    }

    async fn which_exist(&self, references: &[FactReference]) -> CoreResult<Vec<FactReference>> {
        let graph = self.graph.read().clone();
        let mut out = Vec::new();
        for r in references {
            if graph.find_fact(r).await?.is_some() {
                out.push(r.clone());
            }
        }
        Ok(out)
    }

    async fn load_bookmark(&self, feed: &factgraph::feed::FeedId) -> CoreResult<Option<Bookmark>> {
        Ok(self.bookmarks.get(feed))
    }

    async fn save_bookmark(&self, feed: &factgraph::feed::FeedId, bookmark: Bookmark) -> CoreResult<()> {
        self.bookmarks.set(feed.clone(), bookmark);
        Ok(())
    }
}

/// `Office{id}` with no predecessors.
pub fn office(id: i64) -> Fact {
    let mut fields = BTreeMap::new();
    fields.insert("id".to_string(), serde_json::json!(id));
    new_fact("Office", fields, BTreeMap::new())
}

/// `Office.Closed{office}`.
pub fn office_closed(office_ref: FactReference) -> Fact {
    let mut preds = BTreeMap::new();
    preds.insert("office".to_string(), Predecessors::Single(office_ref));
    new_fact("Office.Closed", BTreeMap::new(), preds)
}

/// `User{publicKey}`.
pub fn user(public_key: &str) -> Fact {
    let mut fields = BTreeMap::new();
    fields.insert("publicKey".to_string(), serde_json::json!(public_key));
    new_fact("User", fields, BTreeMap::new())
}

/// `Employee{office, user}`.
pub fn employee(office_ref: FactReference, user_ref: FactReference) -> Fact {
    let mut preds = BTreeMap::new();
    preds.insert("office".to_string(), Predecessors::Single(office_ref));
    preds.insert("user".to_string(), Predecessors::Single(user_ref));
    new_fact("Employee", BTreeMap::new(), preds)
}

/// `President{office, user}`.
pub fn president(office_ref: FactReference, user_ref: FactReference) -> Fact {
    let mut preds = BTreeMap::new();
    preds.insert("office".to_string(), Predecessors::Single(office_ref));
    preds.insert("user".to_string(), Predecessors::Single(user_ref));
    new_fact("President", BTreeMap::new(), preds)
}

/// The model shared by every §8 scenario fixture.
pub fn office_model() -> Model {
    Model::new()
        .role("Office.Closed", "office", "Office")
        .role("Employee", "office", "Office")
        .role("Employee", "user", "User")
        .role("President", "office", "Office")
        .role("President", "user", "User")
}
