use std::path::PathBuf;

use crate::ids::{ResourceId, SourceId};

/// The closed error taxonomy returned by [`ResourceProvider`](crate::provider::ResourceProvider)
/// and its collaborators.
///
/// `Source::load` failures are caught and reported as [`ProviderError::InvalidResource`];
/// everything else is raised directly at the call site that detects it.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("source id {id} does not exist")]
    UnknownSource { id: SourceId },

    #[error("source id {id} is already registered")]
    DuplicateSource { id: SourceId },

    #[error("source id {id} was accessed as the wrong resource type")]
    WrongType { id: SourceId },

    #[error("resource {id} failed to load: {source}")]
    InvalidResource {
        id: ResourceId,
        #[source]
        source: anyhow::Error,
    },

    #[error("{path} is not a readable directory")]
    InvalidPath { path: PathBuf },

    #[error("resource id {resource_id} is produced by both {first} and {second}")]
    AmbiguousName {
        resource_id: ResourceId,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("source and resource ids must be non-empty")]
    EmptyId,

    #[error("the worker pool has been shut down")]
    PoolShutDown,
}
