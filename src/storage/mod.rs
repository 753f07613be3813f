//! # Storage (write + feed, §6.2)
//!
//! The write-side and subscription-side external interface. Concrete
//! backends (in-memory, relational) are external collaborators and out of
//! scope for this core (§1); only the contract and the process-wide
//! [`BookmarkManager`] live here.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::CoreResult;
use crate::fact::{Fact, FactReference};
use crate::feed::FeedId;
use crate::model::Model;
use crate::specification::runner::ProjectedResult;
use crate::specification::{Label, Specification};

/// An opaque pagination cursor over a feed's output tuples. Feed queries are
/// strictly monotone by bookmark (§5): a subscriber holding bookmark `b` is
/// guaranteed to see every tuple with a later bookmark exactly once.
pub type Bookmark = String;

/// A fact plus whatever the envelope format attaches to it. Signing and the
/// wire envelope shape are out of scope (§1); this is a minimal stand-in so
/// `save`/`load` have a concrete type to carry, matching how [`crate::fact`]
/// stands in for the real hashing/signing algorithm.
#[derive(Clone, Debug, PartialEq)]
pub struct FactEnvelope {
    pub fact: Fact,
    pub signatures: Vec<String>,
}

/// One page of a feed's output: facts found per satisfying tuple, plus the
/// bookmark to resume from.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedPage {
    pub tuples: Vec<Vec<FactReference>>,
    pub bookmark: Bookmark,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist `envelopes`; returns the subset that were genuinely new
    /// (content-addressing makes re-saving a no-op for facts already held).
    async fn save(&self, envelopes: Vec<FactEnvelope>) -> CoreResult<Vec<FactEnvelope>>;

    /// Run `spec` seeded by `start`, returning fully projected results. Used
    /// by rule tails (§7.1) and general queries.
    async fn read(
        &self,
        model: &Model,
        start: &[(Label, FactReference)],
        spec: &Specification,
    ) -> CoreResult<Vec<ProjectedResult>>;

    /// One page of a feed's matching tuples strictly past `bookmark`.
    async fn feed(
        &self,
        model: &Model,
        spec: &Specification,
        start: &[(Label, FactReference)],
        bookmark: Bookmark,
    ) -> CoreResult<FeedPage>;

    /// Content-addressed retrieval of specific facts.
    async fn load(&self, references: &[FactReference]) -> CoreResult<Vec<FactEnvelope>>;

    /// Filters `references` down to the subset this storage already holds.
    async fn which_exist(&self, references: &[FactReference]) -> CoreResult<Vec<FactReference>>;

    async fn load_bookmark(&self, feed: &FeedId) -> CoreResult<Option<Bookmark>>;

    async fn save_bookmark(&self, feed: &FeedId, bookmark: Bookmark) -> CoreResult<()>;
}

/// Process-wide `feed -> bookmark` map. Reads and writes are serialized by a
/// single `parking_lot::RwLock`, matching the teacher's `session.rs` use of
/// `parking_lot` for shared session state; `advance` allocates a fresh
/// monotonic value per call so concurrent advances never collide.
pub struct BookmarkManager {
    bookmarks: RwLock<HashMap<FeedId, Bookmark>>,
    counter: std::sync::atomic::AtomicU64,
}

impl Default for BookmarkManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BookmarkManager {
    pub fn new() -> Self {
        Self {
            bookmarks: RwLock::new(HashMap::new()),
            counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn get(&self, feed: &FeedId) -> Option<Bookmark> {
        self.bookmarks.read().get(feed).cloned()
    }

    pub fn set(&self, feed: FeedId, bookmark: Bookmark) {
        self.bookmarks.write().insert(feed, bookmark);
    }

    /// Allocate a fresh monotonic bookmark value and store it for `feed`.
    pub fn advance(&self, feed: FeedId) -> Bookmark {
        let next = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        let bookmark = next.to_string();
        self.set(feed, bookmark.clone());
        bookmark
    }
}
