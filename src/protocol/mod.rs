//! # Wire protocol (§6.3, §6.4)
//!
//! `wire` carries the line-framed SUB/UNSUB/BOOK/ERR subscription frames;
//! `graph` carries the separate forward-only fact/public-key stream format
//! used to deliver the facts a feed produces.

pub mod graph;
pub mod wire;

pub use graph::{GraphReader, GraphWriter};
pub use wire::{Frame, FrameReader};
