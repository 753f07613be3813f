//! # factgraph
//!
//! A content-addressed, immutable fact graph. Application state is a
//! directed acyclic graph of signed facts; queries are declarative
//! *specifications* that traverse predecessor and successor edges.
//!
//! This crate is the specification subsystem: the algebra of
//! specifications, the algorithms that compile them to storage-backed
//! query plans, the inverse-specification transformation that turns a
//! forward query into a set of reactive listeners, and the
//! authorization/distribution engines that consume the same algebra to
//! decide per-fact visibility.
//!
//! ## Module map
//!
//! - [`model`] — the Model Registry: fact type → role → predecessor type.
//! - [`fact`] — `Fact`, `FactReference`, predecessor maps, fixture hashing.
//! - [`specification`] — the specification AST, fluent builder, validator,
//!   canonical text rendering, and the Runner.
//! - [`source`] / [`storage`] — the `FactSource` and `Storage` trait
//!   contracts, plus the `BookmarkManager`.
//! - [`planner`] — query-plan compilation, SQL generation, result
//!   composition.
//! - [`feed`] — the Feed builder and structural feed-identity hashing.
//! - [`split`] — `split_before_first_successor`, shared by `auth` and `feed`.
//! - [`inverter`] — the shake-tree inversion algorithm.
//! - [`auth`] — authorization rules, distribution rules, and the §6.5 text
//!   format.
//! - [`reactive`] — the `InverseSpecificationEngine` listener registry.
//! - [`protocol`] — feed subscription wire frames and graph serialization.
//! - [`config`] — configuration loading.
//! - [`error`] — the unified `CoreError` type.

pub mod auth;
pub mod config;
pub mod error;
pub mod fact;
pub mod feed;
pub mod inverter;
pub mod model;
pub mod planner;
pub mod protocol;
pub mod reactive;
pub mod source;
pub mod specification;
pub mod split;
pub mod storage;

pub use error::{CoreError, CoreResult};
pub use fact::{Fact, FactReference, FactType};
pub use model::Model;
pub use specification::Specification;
