//! `respool` is a typed, asynchronous resource-caching provider.
//!
//! An application registers named [`Source`]s — producers that can list the
//! resource ids they offer and load a resource for one of them — and then
//! retrieves resources by `(SourceId, ResourceId)` through a
//! [`ResourceProvider`]. Loads run on a dedicated [`WorkerPool`], concurrent
//! requests for the same `(source, resource)` pair are coalesced into a
//! single load, and a batch of in-flight loads can be observed through a
//! [`ProgressTracker`] or driven to completion callbacks through an
//! [`OnLoaded`] poller.
//!
//! The surrounding pieces — [`path`] decomposition, [`file_lister`]
//! directory traversal, and the [`file_source`] template — are conventional
//! collaborators the core consumes but does not depend on; an application
//! can register any type implementing [`Source`] instead.

pub mod error;
pub mod file_lister;
pub mod file_source;
pub mod handle;
pub mod ids;
pub mod path;
pub mod poller;
pub mod progress;
pub mod provider;
pub mod source;
pub mod views;
pub mod worker_pool;

pub use error::ProviderError;
pub use file_lister::FileLister;
pub use file_source::{FileSource, Naming};
pub use handle::LoadHandle;
pub use ids::{ResourceId, SourceId};
pub use path::RexPath;
pub use poller::OnLoaded;
pub use progress::{ProgressTracker, Status};
pub use provider::ResourceProvider;
pub use source::{Source, SourceView};
pub use views::{AsyncResourceView, ResourceView};
pub use worker_pool::WorkerPool;
