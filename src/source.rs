//! The [`Source`] trait applications implement, and [`SourceView`], the
//! shared handle to a registered source returned by
//! [`ResourceProvider::add_source`](crate::provider::ResourceProvider::add_source)
//! and [`ResourceProvider::source`](crate::provider::ResourceProvider::source).

use std::ops::Deref;
use std::sync::Arc;

use crate::ids::{ResourceId, SourceId};

/// A named producer of resources: it can enumerate the resource ids it
/// offers and load any one of them on demand.
///
/// `load` runs on a worker pool thread, never on the caller's thread, so it
/// is free to block.
pub trait Source: Send + Sync + 'static {
    type Resource: Send + Sync + 'static;

    fn list(&self) -> Vec<ResourceId>;
    fn load(&self, id: &ResourceId) -> anyhow::Result<Self::Resource>;
}

/// A view of a registered source: its id, plus a shared, cheaply cloneable
/// handle to the concrete source value. `Deref`s to `S` for convenience.
///
/// Backed by an `Arc` rather than a borrow tied to the registry's lock
/// guard — the registry is reached through a reentrant mutex that may
/// already be held by the calling thread (the fast path of `get` calls the
/// same routines `async_get` does), and a view that outlived that guard
/// would otherwise dangle.
pub struct SourceView<S> {
    pub id: SourceId,
    pub source: Arc<S>,
}

impl<S> Clone for SourceView<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            source: Arc::clone(&self.source),
        }
    }
}

impl<S> Deref for SourceView<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.source
    }
}
