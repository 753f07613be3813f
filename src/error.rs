//! Unified error type for the specification subsystem.
//!
//! Every subsystem (validator, runner, planner, inverter, auth) raises one of
//! these variants rather than a bare string, mirroring the teacher's
//! `StorageError`/`InputLayerError` pattern of structured, `#[from]`-composed
//! errors.

use thiserror::Error;

use crate::fact::FactReference;

/// Connectivity enforcement mode for the specification validator (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityMode {
    /// Skip the connectivity check entirely.
    Off,
    /// Run the check, but only log a warning on failure.
    Warn,
    /// Run the check and raise `DisconnectedSpecification` on failure.
    #[default]
    Error,
}

/// All errors the core can raise.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A specification's shape violates a static invariant (§4.1).
    #[error("malformed specification: {0}")]
    MalformedSpecification(String),

    /// A specification's label graph is disconnected (§4.1).
    #[error("disconnected specification: labels {0:?} are not reachable from the projection")]
    DisconnectedSpecification(Vec<String>),

    /// A fact reference the source does not know about.
    #[error("unknown fact: {0:?}")]
    UnknownFact(FactReference),

    /// The model has no entry for this role on this type.
    #[error("unknown role '{role}' on type '{fact_type}'")]
    UnknownRole { fact_type: String, role: String },

    /// The model or schema has never seen this fact type.
    #[error("unknown type '{0}'")]
    UnknownType(String),

    /// A candidate fact was not authorized by any rule for its type.
    #[error("authorization denied for type '{fact_type}': no rule matched submitter")]
    AuthorizationDenied { fact_type: String },

    /// A requested feed was not permitted by any distribution rule.
    #[error("distribution denied: {reason}")]
    DistributionDenied { reason: String },

    /// A lower-level transport/timeout failure from an external collaborator.
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON (de)serialization failure, e.g. decoding a graph-serialization payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
