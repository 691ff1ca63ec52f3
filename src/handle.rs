//! The shared completion handle returned for every in-flight or resolved
//! load. This is a small hand-rolled stand-in for a shared future: the
//! provider's concurrency model is worker threads and condvars, not an
//! async runtime, so a runtime-free primitive is the natural fit.

use std::sync::{Arc, Condvar, Mutex};

use crate::error::ProviderError;

enum Slot<R> {
    Pending,
    Done(Arc<R>),
    Failed(Arc<ProviderError>),
}

impl<R> Clone for Slot<R> {
    fn clone(&self) -> Self {
        match self {
            Slot::Pending => Slot::Pending,
            Slot::Done(r) => Slot::Done(Arc::clone(r)),
            Slot::Failed(e) => Slot::Failed(Arc::clone(e)),
        }
    }
}

struct Inner<R> {
    slot: Mutex<Slot<R>>,
    condvar: Condvar,
}

/// A cloneable handle to a load that may still be running.
///
/// All clones observe the same underlying completion: once one resolves,
/// every clone immediately reports the same outcome.
pub struct LoadHandle<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for LoadHandle<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Paired with a [`LoadHandle`]; the worker pool task holds this and calls
/// [`Resolver::resolve`] exactly once when the load finishes.
pub struct Resolver<R> {
    inner: Arc<Inner<R>>,
}

impl<R> LoadHandle<R> {
    /// Creates a pending handle and the resolver used to complete it.
    pub fn new_pending() -> (Self, Resolver<R>) {
        let inner = Arc::new(Inner {
            slot: Mutex::new(Slot::Pending),
            condvar: Condvar::new(),
        });
        (
            Self {
                inner: Arc::clone(&inner),
            },
            Resolver { inner },
        )
    }

    /// Creates a handle that is already resolved, for cache hits that never
    /// need to go through the worker pool.
    pub fn ready(resource: Arc<R>) -> Self {
        let inner = Arc::new(Inner {
            slot: Mutex::new(Slot::Done(resource)),
            condvar: Condvar::new(),
        });
        Self { inner }
    }

    /// Blocks the calling thread until the load resolves, then returns its
    /// outcome.
    pub fn wait(&self) -> Result<Arc<R>, Arc<ProviderError>> {
        let mut slot = self.inner.slot.lock().unwrap();
        loop {
            match &*slot {
                Slot::Pending => slot = self.inner.condvar.wait(slot).unwrap(),
                Slot::Done(r) => return Ok(Arc::clone(r)),
                Slot::Failed(e) => return Err(Arc::clone(e)),
            }
        }
    }

    /// Non-blocking check: `None` if the load is still running.
    pub fn poll(&self) -> Option<Result<Arc<R>, Arc<ProviderError>>> {
        match &*self.inner.slot.lock().unwrap() {
            Slot::Pending => None,
            Slot::Done(r) => Some(Ok(Arc::clone(r))),
            Slot::Failed(e) => Some(Err(Arc::clone(e))),
        }
    }

    pub fn is_done(&self) -> bool {
        self.poll().is_some()
    }
}

impl<R> Resolver<R> {
    pub fn resolve(self, outcome: Result<Arc<R>, ProviderError>) {
        let mut slot = self.inner.slot.lock().unwrap();
        *slot = match outcome {
            Ok(r) => Slot::Done(r),
            Err(e) => Slot::Failed(Arc::new(e)),
        };
        drop(slot);
        self.inner.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn ready_handle_polls_immediately() {
        let handle = LoadHandle::ready(Arc::new(7i32));
        assert_eq!(*handle.poll().unwrap().unwrap(), 7);
    }

    #[test]
    fn pending_handle_blocks_until_resolved() {
        let (handle, resolver) = LoadHandle::<i32>::new_pending();
        assert!(handle.poll().is_none());

        let waiter = handle.clone();
        let joined = std::thread::spawn(move || waiter.wait());

        std::thread::sleep(Duration::from_millis(20));
        resolver.resolve(Ok(Arc::new(99)));

        assert_eq!(*joined.join().unwrap().unwrap(), 99);
        assert_eq!(*handle.poll().unwrap().unwrap(), 99);
    }

    #[test]
    fn failure_is_reported_to_every_clone() {
        let (handle, resolver) = LoadHandle::<i32>::new_pending();
        let other = handle.clone();
        resolver.resolve(Err(ProviderError::EmptyId));
        assert!(handle.poll().unwrap().is_err());
        assert!(other.wait().is_err());
    }
}
