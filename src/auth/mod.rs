//! # Authorization and distribution (§4.6, §4.8)
//!
//! Two related engines, both built on [`crate::split`]'s
//! predecessor/successor partition: authorization decides whether a
//! submitter may author a candidate fact, distribution decides whether a
//! requester may receive a feed.

pub mod distribution;
pub mod engine;
pub mod rules;
pub mod text;

pub use distribution::{check_distribution, DistributionRule, DistributionRules};
pub use engine::{get_authorized_population, is_authorized, UserProjection};
pub use rules::{AuthorizationRule, AuthorizationRules};
pub use text::{render_authorization, render_distribution};
