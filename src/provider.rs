//! The resource provider: the façade that ties together the source
//! registry, the resource cache, the in-flight load table, and the worker
//! pool.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace};
use parking_lot::ReentrantMutex;

use crate::error::ProviderError;
use crate::handle::LoadHandle;
use crate::ids::{ResourceId, SourceId};
use crate::source::{Source, SourceView};
use crate::views::{AsyncResourceView, ResourceView};
use crate::worker_pool::WorkerPool;

/// Priority every resource load is submitted at; the provider does not
/// currently expose a way to change it per call.
const LOAD_PRIORITY: i64 = 0;

type ListFn = Box<dyn Fn() -> Vec<ResourceId> + Send + Sync>;
// `Arc`, not `Box`: `run_load` clones this out from under the table lock so
// the load itself (which can block for arbitrarily long) never runs while
// the lock is held.
type LoadFn = Arc<dyn Fn(&ResourceId) -> anyhow::Result<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// A registered source, type-erased behind a pair of monomorphic trampoline
/// closures captured at [`ResourceProvider::add_source`] time. `source`
/// keeps the concrete value (as `Arc<dyn Any + Send + Sync>`) alive and
/// available for a later typed downcast in
/// [`ResourceProvider::source`]/[`ResourceProvider::add_source`]'s return
/// value; `list_fn`/`load_fn` are the only things the provider's internal
/// machinery needs to call without knowing the concrete source type.
struct SourceEntry {
    source: Arc<dyn Any + Send + Sync>,
    resource_type: TypeId,
    list_fn: ListFn,
    load_fn: LoadFn,
}

fn build_entry<S: Source>(source: Arc<S>) -> SourceEntry {
    let list_source = Arc::clone(&source);
    let load_source = Arc::clone(&source);
    SourceEntry {
        resource_type: TypeId::of::<S::Resource>(),
        list_fn: Box::new(move || Source::list(&*list_source)),
        load_fn: Arc::new(move |rid: &ResourceId| {
            let resource = Source::load(&*load_source, rid)?;
            Ok(Box::new(resource) as Box<dyn Any + Send + Sync>)
        }),
        source,
    }
}

type CacheSlot = Arc<dyn Any + Send + Sync>;
type InFlightSlot = Box<dyn Any + Send + Sync>;

#[derive(Default)]
struct Tables {
    sources: HashMap<SourceId, SourceEntry>,
    cache: HashMap<SourceId, HashMap<ResourceId, CacheSlot>>,
    in_flight: HashMap<SourceId, HashMap<ResourceId, InFlightSlot>>,
    /// Source ids in the process of being torn down by `remove_source` or
    /// `clear_sources`, between the moment teardown is committed to and the
    /// final removal from `sources`. While an id is in this set, every
    /// lookup that would otherwise admit a *new* load (`async_get`, `list`)
    /// reports `UnknownSource` instead, so no fresh in-flight entry can be
    /// inserted underneath a removal that is already waiting for the
    /// existing ones to drain (§3 invariant 5).
    removing: HashSet<SourceId>,
}

impl Tables {
    fn is_removing(&self, id: &SourceId) -> bool {
        self.removing.contains(id)
    }
}

struct Inner {
    tables: ReentrantMutex<RefCell<Tables>>,
    pool: WorkerPool,
}

/// Coordinates named sources, a single-flight typed cache, and a worker
/// pool that runs every load off the caller's thread.
///
/// All bookkeeping lives behind one reentrant mutex: the synchronous `get`
/// path calls the same routines `async_get` does while still holding the
/// lock, which an ordinary (non-reentrant) mutex cannot permit.
///
/// `ResourceProvider` is a thin, cloneable handle around its shared state
/// (an `Arc` internally), so a worker-pool task can hold its own clone and
/// reach back into the provider to promote a finished load into the cache,
/// without the provider needing to outlive `'static` borrows.
#[derive(Clone)]
pub struct ResourceProvider {
    inner: Arc<Inner>,
}

impl ResourceProvider {
    pub fn new(pool: WorkerPool) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: ReentrantMutex::new(RefCell::new(Tables::default())),
                pool,
            }),
        }
    }

    // ---- sources ----------------------------------------------------

    pub fn add_source<S: Source>(
        &self,
        id: SourceId,
        source: S,
    ) -> Result<SourceView<S>, ProviderError> {
        let lock = self.inner.tables.lock();
        let mut tables = lock.borrow_mut();
        if tables.sources.contains_key(&id) {
            return Err(ProviderError::DuplicateSource { id });
        }
        debug!("registering source {id}");
        let source = Arc::new(source);
        tables.sources.insert(id.clone(), build_entry(Arc::clone(&source)));
        Ok(SourceView { id, source })
    }

    /// Raises [`ProviderError::UnknownSource`] if `id` is not registered, or
    /// [`ProviderError::WrongType`] if it was registered with a different
    /// concrete source type than `S`.
    pub fn source<S: Source>(&self, id: &SourceId) -> Result<SourceView<S>, ProviderError> {
        let lock = self.inner.tables.lock();
        let tables = lock.borrow();
        if tables.is_removing(id) {
            return Err(ProviderError::UnknownSource { id: id.clone() });
        }
        let entry = tables
            .sources
            .get(id)
            .ok_or_else(|| ProviderError::UnknownSource { id: id.clone() })?;
        let source = Arc::clone(&entry.source)
            .downcast::<S>()
            .map_err(|_| ProviderError::WrongType { id: id.clone() })?;
        Ok(SourceView { id: id.clone(), source })
    }

    pub fn sources(&self) -> BTreeSet<SourceId> {
        let lock = self.inner.tables.lock();
        let tables = lock.borrow();
        tables
            .sources
            .keys()
            .filter(|id| !tables.is_removing(id))
            .cloned()
            .collect()
    }

    /// Removes the source, its cache, and its in-flight entries together.
    ///
    /// First commits to the removal under the table lock by marking `id` as
    /// "removing": from that instant on, every lookup that could admit a
    /// *new* load for this source (`async_get`, `list`, `source`) reports
    /// `UnknownSource`, so the in-flight set for `id` can only shrink from
    /// here. Only then do we wait for it to empty and perform the final
    /// removal — closing the window a stale snapshot would otherwise leave
    /// open for a concurrent `async_get` to slip a fresh load in between the
    /// drain and the removal (§3 invariant 5).
    pub fn remove_source(&self, id: &SourceId) -> bool {
        {
            let lock = self.inner.tables.lock();
            let mut tables = lock.borrow_mut();
            if !tables.sources.contains_key(id) || !tables.removing.insert(id.clone()) {
                return false;
            }
        }

        self.wait_until_quiescent(id);

        let lock = self.inner.tables.lock();
        let mut tables = lock.borrow_mut();
        tables.cache.remove(id);
        tables.in_flight.remove(id);
        tables.removing.remove(id);
        tables.sources.remove(id).is_some()
    }

    /// Blocks until all in-flight loads across every source have drained,
    /// then clears the registry, cache, and in-flight table. Every
    /// currently-registered source is marked "removing" up front, under one
    /// lock acquisition, so no source can admit a new load once draining
    /// begins — the same guard `remove_source` uses, applied to all of them
    /// at once.
    pub fn clear_sources(&self) {
        let ids: Vec<SourceId> = {
            let lock = self.inner.tables.lock();
            let mut tables = lock.borrow_mut();
            let ids: Vec<SourceId> = tables.sources.keys().cloned().collect();
            tables.removing.extend(ids.iter().cloned());
            ids
        };

        for id in &ids {
            self.wait_until_quiescent(id);
        }

        let lock = self.inner.tables.lock();
        let mut tables = lock.borrow_mut();
        tables.sources.clear();
        tables.cache.clear();
        tables.in_flight.clear();
        tables.removing.clear();
    }

    /// Blocks until `in_flight[id]` is empty. Safe to use without further
    /// synchronization only once `id` has been marked "removing" (or the
    /// caller otherwise knows no new entries can be admitted), since this
    /// just polls the current state rather than a point-in-time snapshot.
    fn wait_until_quiescent(&self, id: &SourceId) {
        loop {
            let empty = {
                let lock = self.inner.tables.lock();
                let tables = lock.borrow();
                tables
                    .in_flight
                    .get(id)
                    .map(|per_source| per_source.is_empty())
                    .unwrap_or(true)
            };
            if empty {
                return;
            }
            std::thread::sleep(Duration::from_micros(200));
        }
    }

    pub fn list(&self, id: &SourceId) -> Result<Vec<ResourceId>, ProviderError> {
        let lock = self.inner.tables.lock();
        let tables = lock.borrow();
        if tables.is_removing(id) {
            return Err(ProviderError::UnknownSource { id: id.clone() });
        }
        let entry = tables
            .sources
            .get(id)
            .ok_or_else(|| ProviderError::UnknownSource { id: id.clone() })?;
        Ok((entry.list_fn)())
    }

    // ---- sync get -----------------------------------------------------

    pub fn get<R: Send + Sync + 'static>(
        &self,
        id: &SourceId,
        rid: &ResourceId,
    ) -> Result<Arc<R>, ProviderError> {
        let handle = self.async_get::<R>(id, rid)?;
        handle
            .handle
            .wait()
            .map_err(|err| clone_error(&err))
    }

    /// Loads each id in order, one at a time, stopping at the first
    /// failure: the `n+1`th load is never even submitted once the `n`th
    /// raises. Mirrors the original's sequential `get` loop — if you want
    /// every id's load running in parallel regardless of earlier failures,
    /// use [`ResourceProvider::async_get_many`] instead.
    pub fn get_many<R: Send + Sync + 'static>(
        &self,
        id: &SourceId,
        rids: &[ResourceId],
    ) -> Result<Vec<ResourceView<R>>, ProviderError> {
        let mut views = Vec::with_capacity(rids.len());
        for rid in rids {
            let resource = self.get::<R>(id, rid)?;
            views.push(ResourceView {
                id: rid.clone(),
                resource,
            });
        }
        Ok(views)
    }

    pub fn get_all<R: Send + Sync + 'static>(
        &self,
        id: &SourceId,
    ) -> Result<Vec<ResourceView<R>>, ProviderError> {
        let ids = self.list(id)?;
        self.get_many(id, &ids)
    }

    // ---- async get ------------------------------------------------

    pub fn async_get<R: Send + Sync + 'static>(
        &self,
        id: &SourceId,
        rid: &ResourceId,
    ) -> Result<AsyncResourceView<R>, ProviderError> {
        let lock = self.inner.tables.lock();
        let mut tables = lock.borrow_mut();

        if tables.is_removing(id) {
            return Err(ProviderError::UnknownSource { id: id.clone() });
        }
        let entry = tables
            .sources
            .get(id)
            .ok_or_else(|| ProviderError::UnknownSource { id: id.clone() })?;
        if entry.resource_type != TypeId::of::<R>() {
            return Err(ProviderError::WrongType { id: id.clone() });
        }

        if let Some(cached) = tables
            .cache
            .get(id)
            .and_then(|per_source| per_source.get(rid))
        {
            let resource = Arc::clone(cached)
                .downcast::<R>()
                .expect("cache entry type matches registered resource type");
            trace!("cache hit for {id}/{rid}");
            return Ok(AsyncResourceView {
                id: rid.clone(),
                handle: LoadHandle::ready(resource),
            });
        }

        if let Some(existing) = tables
            .in_flight
            .get(id)
            .and_then(|per_source| per_source.get(rid))
        {
            let handle = existing
                .downcast_ref::<LoadHandle<R>>()
                .expect("in-flight entry type matches registered resource type")
                .clone();
            trace!("piggybacking on in-flight load for {id}/{rid}");
            return Ok(AsyncResourceView {
                id: rid.clone(),
                handle,
            });
        }

        let (handle, resolver) = LoadHandle::<R>::new_pending();
        tables
            .in_flight
            .entry(id.clone())
            .or_default()
            .insert(rid.clone(), Box::new(handle.clone()));
        drop(tables);
        drop(lock);

        self.submit_load::<R>(id.clone(), rid.clone(), resolver)?;

        Ok(AsyncResourceView {
            id: rid.clone(),
            handle,
        })
    }

    fn submit_load<R: Send + Sync + 'static>(
        &self,
        id: SourceId,
        rid: ResourceId,
        resolver: crate::handle::Resolver<R>,
    ) -> Result<(), ProviderError> {
        // Cloning the provider just bumps the `Arc<Inner>` refcount, so the
        // worker thread keeps its own handle into the shared tables and pool
        // independent of how long the caller's `&self` lives.
        let provider = self.clone();
        let task = move || {
            let outcome = provider.run_load::<R>(&id, &rid);
            resolver.resolve(outcome);
        };
        self.inner.pool.enqueue(LOAD_PRIORITY, task)
    }

    fn run_load<R: Send + Sync + 'static>(
        &self,
        id: &SourceId,
        rid: &ResourceId,
    ) -> Result<Arc<R>, ProviderError> {
        // Clone the trampoline out from under the lock and drop it before
        // actually running the load: `load_fn` may block for as long as the
        // source wants, and the table lock guards every other provider
        // operation, so holding it across the load would serialize the
        // entire provider on one in-flight request.
        let load_fn = {
            let lock = self.inner.tables.lock();
            let tables = lock.borrow();
            let entry = tables
                .sources
                .get(id)
                .expect("source removed while a load for it was in flight");
            Arc::clone(&entry.load_fn)
        };
        let load_result = load_fn(rid);

        let lock = self.inner.tables.lock();
        let mut tables = lock.borrow_mut();
        tables
            .in_flight
            .get_mut(id)
            .map(|per_source| per_source.remove(rid));

        match load_result {
            Ok(boxed) => {
                let resource: Arc<R> = Arc::from(
                    *boxed
                        .downcast::<R>()
                        .expect("load_fn produces the registered resource type"),
                );
                tables
                    .cache
                    .entry(id.clone())
                    .or_default()
                    .insert(rid.clone(), resource.clone() as CacheSlot);
                trace!("load completed for {id}/{rid}");
                Ok(resource)
            }
            Err(source) => {
                debug!("load failed for {id}/{rid}: {source}");
                Err(ProviderError::InvalidResource {
                    id: rid.clone(),
                    source,
                })
            }
        }
    }

    pub fn async_get_many<R: Send + Sync + 'static>(
        &self,
        id: &SourceId,
        rids: &[ResourceId],
    ) -> Result<Vec<AsyncResourceView<R>>, ProviderError> {
        rids.iter().map(|rid| self.async_get::<R>(id, rid)).collect()
    }

    pub fn async_get_all<R: Send + Sync + 'static>(
        &self,
        id: &SourceId,
    ) -> Result<Vec<AsyncResourceView<R>>, ProviderError> {
        let ids = self.list(id)?;
        self.async_get_many(id, &ids)
    }

    // ---- cache maintenance --------------------------------------------

    /// Waits for any in-flight load of `rid` to finish, then drops its
    /// cache entry if present. A no-op if neither exists.
    ///
    /// `mark_unused` doesn't remove the source itself, so unlike
    /// `remove_source` it can't simply reject new loads while it waits.
    /// Instead the check for "is anything still in flight for this id" and
    /// the final cache removal happen inside the *same* lock acquisition
    /// (the loop only ever drops the lock to sleep when it finds work still
    /// in flight), so nothing can insert a fresh in-flight entry for `rid`
    /// in between deciding the wait is over and actually clearing it.
    pub fn mark_unused(&self, id: &SourceId, rid: &ResourceId) -> Result<(), ProviderError> {
        loop {
            let lock = self.inner.tables.lock();
            let mut tables = lock.borrow_mut();
            if !tables.sources.contains_key(id) {
                return Err(ProviderError::UnknownSource { id: id.clone() });
            }
            let still_in_flight = tables
                .in_flight
                .get(id)
                .map(|per_source| per_source.contains_key(rid))
                .unwrap_or(false);
            if !still_in_flight {
                if let Some(per_source) = tables.cache.get_mut(id) {
                    per_source.remove(rid);
                }
                return Ok(());
            }
            drop(tables);
            drop(lock);
            std::thread::sleep(Duration::from_micros(200));
        }
    }

    /// Waits for every in-flight load of this source to finish, then clears
    /// its entire cache. Same atomic check-then-clear pattern as
    /// [`ResourceProvider::mark_unused`], generalized to "is `in_flight[id]`
    /// empty" instead of "is this one `rid` absent".
    pub fn mark_all_unused(&self, id: &SourceId) -> Result<(), ProviderError> {
        loop {
            let lock = self.inner.tables.lock();
            let mut tables = lock.borrow_mut();
            if !tables.sources.contains_key(id) {
                return Err(ProviderError::UnknownSource { id: id.clone() });
            }
            let still_in_flight = tables
                .in_flight
                .get(id)
                .map(|per_source| !per_source.is_empty())
                .unwrap_or(false);
            if !still_in_flight {
                tables.cache.remove(id);
                return Ok(());
            }
            drop(tables);
            drop(lock);
            std::thread::sleep(Duration::from_micros(200));
        }
    }
}

impl Default for ResourceProvider {
    fn default() -> Self {
        Self::new(WorkerPool::default())
    }
}

fn clone_error(err: &Arc<ProviderError>) -> ProviderError {
    match err.as_ref() {
        ProviderError::InvalidResource { id, source } => ProviderError::InvalidResource {
            id: id.clone(),
            source: anyhow::anyhow!(source.to_string()),
        },
        ProviderError::UnknownSource { id } => ProviderError::UnknownSource { id: id.clone() },
        ProviderError::DuplicateSource { id } => ProviderError::DuplicateSource { id: id.clone() },
        ProviderError::WrongType { id } => ProviderError::WrongType { id: id.clone() },
        ProviderError::InvalidPath { path } => ProviderError::InvalidPath { path: path.clone() },
        ProviderError::AmbiguousName {
            resource_id,
            first,
            second,
        } => ProviderError::AmbiguousName {
            resource_id: resource_id.clone(),
            first: first.clone(),
            second: second.clone(),
        },
        ProviderError::EmptyId => ProviderError::EmptyId,
        ProviderError::PoolShutDown => ProviderError::PoolShutDown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl Source for CountingSource {
        type Resource = i32;

        fn list(&self) -> Vec<ResourceId> {
            vec![ResourceId::new("a").unwrap(), ResourceId::new("b").unwrap()]
        }

        fn load(&self, id: &ResourceId) -> anyhow::Result<i32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            match id.as_str() {
                "a" => Ok(1),
                "b" => Ok(2),
                other => Err(anyhow::anyhow!("unknown id {other}")),
            }
        }
    }

    struct OtherSource;
    impl Source for OtherSource {
        type Resource = String;
        fn list(&self) -> Vec<ResourceId> {
            vec![]
        }
        fn load(&self, _id: &ResourceId) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    fn provider() -> ResourceProvider {
        ResourceProvider::new(WorkerPool::new(4))
    }

    #[test]
    fn add_and_get_a_resource() {
        let provider = provider();
        let calls = Arc::new(AtomicUsize::new(0));
        let sid = SourceId::new("counting").unwrap();
        provider
            .add_source(
                sid.clone(),
                CountingSource {
                    calls: calls.clone(),
                    delay: Duration::from_millis(0),
                },
            )
            .unwrap();

        let value = provider.get::<i32>(&sid, &ResourceId::new("a").unwrap()).unwrap();
        assert_eq!(*value, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_source_is_rejected() {
        let provider = provider();
        let sid = SourceId::new("s").unwrap();
        provider.add_source(sid.clone(), OtherSource).unwrap();
        assert!(matches!(
            provider.add_source(sid, OtherSource),
            Err(ProviderError::DuplicateSource { .. })
        ));
    }

    #[test]
    fn unknown_source_is_reported() {
        let provider = provider();
        let sid = SourceId::new("missing").unwrap();
        assert!(matches!(
            provider.list(&sid),
            Err(ProviderError::UnknownSource { .. })
        ));
    }

    #[test]
    fn add_source_then_remove_then_source_is_unknown() {
        let provider = provider();
        let sid = SourceId::new("people").unwrap();
        provider.add_source(sid.clone(), OtherSource).unwrap();
        assert!(matches!(
            provider.add_source(sid.clone(), OtherSource),
            Err(ProviderError::DuplicateSource { .. })
        ));

        assert!(provider.remove_source(&sid));
        assert!(matches!(
            provider.source::<OtherSource>(&sid),
            Err(ProviderError::UnknownSource { .. })
        ));
    }

    #[test]
    fn source_view_round_trips_to_the_concrete_source() {
        let provider = provider();
        let calls = Arc::new(AtomicUsize::new(0));
        let sid = SourceId::new("counting").unwrap();
        let added = provider
            .add_source(
                sid.clone(),
                CountingSource {
                    calls: calls.clone(),
                    delay: Duration::from_millis(0),
                },
            )
            .unwrap();
        assert_eq!(added.id, sid);

        let fetched = provider.source::<CountingSource>(&sid).unwrap();
        assert_eq!(fetched.list().len(), 2);

        assert!(matches!(
            provider.source::<OtherSource>(&sid),
            Err(ProviderError::WrongType { .. })
        ));
    }

    #[test]
    fn wrong_type_is_reported_without_loading() {
        let provider = provider();
        let calls = Arc::new(AtomicUsize::new(0));
        let sid = SourceId::new("counting").unwrap();
        provider
            .add_source(
                sid.clone(),
                CountingSource {
                    calls: calls.clone(),
                    delay: Duration::from_millis(0),
                },
            )
            .unwrap();

        let result = provider.get::<String>(&sid, &ResourceId::new("a").unwrap());
        assert!(matches!(result, Err(ProviderError::WrongType { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn a_slow_load_does_not_block_unrelated_provider_calls() {
        // Regression test: the table lock must be released before the load
        // itself runs, or a slow `load` on one (source, resource) pair would
        // serialize every other provider call behind it.
        let provider = provider();
        let sid = SourceId::new("counting").unwrap();
        provider
            .add_source(
                sid.clone(),
                CountingSource {
                    calls: Arc::new(AtomicUsize::new(0)),
                    delay: Duration::from_millis(200),
                },
            )
            .unwrap();
        provider.add_source(SourceId::new("other").unwrap(), OtherSource).unwrap();

        let _slow = provider.async_get::<i32>(&sid, &ResourceId::new("a").unwrap()).unwrap();

        let started = std::time::Instant::now();
        provider.list(&sid).unwrap();
        assert!(provider.add_source(SourceId::new("fresh").unwrap(), OtherSource).is_ok());
        assert!(provider
            .get::<String>(&SourceId::new("other").unwrap(), &ResourceId::new("unused").unwrap())
            .is_ok());
        assert!(
            started.elapsed() < Duration::from_millis(100),
            "unrelated calls must not wait for the in-flight load to finish"
        );
    }

    #[test]
    fn concurrent_async_get_coalesces_into_a_single_load() {
        let provider = Arc::new(provider());
        let calls = Arc::new(AtomicUsize::new(0));
        let sid = SourceId::new("counting").unwrap();
        provider
            .add_source(
                sid.clone(),
                CountingSource {
                    calls: calls.clone(),
                    delay: Duration::from_millis(50),
                },
            )
            .unwrap();

        let rid = ResourceId::new("a").unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                let sid = sid.clone();
                let rid = rid.clone();
                std::thread::spawn(move || provider.async_get::<i32>(&sid, &rid).unwrap())
            })
            .map(|t| t.join().unwrap())
            .collect();

        for view in &handles {
            assert_eq!(*view.handle.wait().unwrap(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cache_hit_resolves_without_reloading() {
        let provider = provider();
        let calls = Arc::new(AtomicUsize::new(0));
        let sid = SourceId::new("counting").unwrap();
        provider
            .add_source(
                sid.clone(),
                CountingSource {
                    calls: calls.clone(),
                    delay: Duration::from_millis(0),
                },
            )
            .unwrap();

        let rid = ResourceId::new("a").unwrap();
        provider.get::<i32>(&sid, &rid).unwrap();
        let view = provider.async_get::<i32>(&sid, &rid).unwrap();
        assert!(view.handle.is_done());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_all_returns_every_listed_resource() {
        let provider = provider();
        let calls = Arc::new(AtomicUsize::new(0));
        let sid = SourceId::new("counting").unwrap();
        provider
            .add_source(
                sid.clone(),
                CountingSource {
                    calls: calls.clone(),
                    delay: Duration::from_millis(0),
                },
            )
            .unwrap();

        let mut views = provider.get_all::<i32>(&sid).unwrap();
        views.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        assert_eq!(views.len(), 2);
        assert_eq!(*views[0].resource, 1);
        assert_eq!(*views[1].resource, 2);
    }

    #[test]
    fn mark_unused_drops_a_cached_resource() {
        let provider = provider();
        let calls = Arc::new(AtomicUsize::new(0));
        let sid = SourceId::new("counting").unwrap();
        provider
            .add_source(
                sid.clone(),
                CountingSource {
                    calls: calls.clone(),
                    delay: Duration::from_millis(0),
                },
            )
            .unwrap();

        let rid = ResourceId::new("a").unwrap();
        provider.get::<i32>(&sid, &rid).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        provider.mark_unused(&sid, &rid).unwrap();
        provider.get::<i32>(&sid, &rid).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn remove_source_clears_its_cache_and_in_flight_entries() {
        let provider = provider();
        let calls = Arc::new(AtomicUsize::new(0));
        let sid = SourceId::new("counting").unwrap();
        provider
            .add_source(
                sid.clone(),
                CountingSource {
                    calls: calls.clone(),
                    delay: Duration::from_millis(0),
                },
            )
            .unwrap();

        provider.get::<i32>(&sid, &ResourceId::new("a").unwrap()).unwrap();
        assert!(provider.remove_source(&sid));
        assert!(!provider.remove_source(&sid));
        assert!(matches!(
            provider.list(&sid),
            Err(ProviderError::UnknownSource { .. })
        ));
    }

    #[test]
    fn remove_source_waits_for_an_in_flight_load_before_removing() {
        let provider = provider();
        let calls = Arc::new(AtomicUsize::new(0));
        let sid = SourceId::new("counting").unwrap();
        provider
            .add_source(
                sid.clone(),
                CountingSource {
                    calls: calls.clone(),
                    delay: Duration::from_millis(50),
                },
            )
            .unwrap();

        let rid = ResourceId::new("a").unwrap();
        let _ = provider.async_get::<i32>(&sid, &rid).unwrap();

        // Removal must block until the load above finishes, never racing
        // the worker thread that still expects the source to be present.
        assert!(provider.remove_source(&sid));
        assert!(!provider.remove_source(&sid));
    }

    #[test]
    fn remove_source_rejects_new_loads_racing_the_removal() {
        // Regression test: once removal has committed, a concurrent
        // `async_get` for a resource id that was never in flight at the
        // start of `remove_source` must see `UnknownSource`, not sneak a
        // fresh load into `in_flight` behind the drain. Before the fix this
        // could panic the worker thread (`run_load`'s
        // "source removed while a load for it was in flight" `.expect`)
        // and leave the caller's handle pending forever.
        let provider = provider();
        let calls = Arc::new(AtomicUsize::new(0));
        let sid = SourceId::new("counting").unwrap();
        provider
            .add_source(
                sid.clone(),
                CountingSource {
                    calls: calls.clone(),
                    delay: Duration::from_millis(50),
                },
            )
            .unwrap();

        // Keep one load in flight so `remove_source` has to wait, widening
        // the window in which a racing `async_get` could previously land.
        let _ = provider.async_get::<i32>(&sid, &ResourceId::new("a").unwrap()).unwrap();

        let remover = {
            let provider = provider.clone();
            let sid = sid.clone();
            std::thread::spawn(move || provider.remove_source(&sid))
        };

        std::thread::sleep(Duration::from_millis(10));
        let racing_result = provider.async_get::<i32>(&sid, &ResourceId::new("b").unwrap());
        assert!(matches!(racing_result, Err(ProviderError::UnknownSource { .. })));

        assert!(remover.join().unwrap());
    }

    #[test]
    fn clear_sources_waits_for_all_in_flight_loads() {
        let provider = provider();
        let calls = Arc::new(AtomicUsize::new(0));
        let sid = SourceId::new("counting").unwrap();
        provider
            .add_source(
                sid.clone(),
                CountingSource {
                    calls: calls.clone(),
                    delay: Duration::from_millis(50),
                },
            )
            .unwrap();

        let _ = provider
            .async_get::<i32>(&sid, &ResourceId::new("a").unwrap())
            .unwrap();
        let _ = provider
            .async_get::<i32>(&sid, &ResourceId::new("b").unwrap())
            .unwrap();

        provider.clear_sources();
        assert!(provider.sources().is_empty());
        assert!(matches!(
            provider.list(&sid),
            Err(ProviderError::UnknownSource { .. })
        ));
    }

    #[test]
    fn load_failure_surfaces_as_invalid_resource() {
        let provider = provider();
        let calls = Arc::new(AtomicUsize::new(0));
        let sid = SourceId::new("counting").unwrap();
        provider
            .add_source(
                sid.clone(),
                CountingSource {
                    calls: calls.clone(),
                    delay: Duration::from_millis(0),
                },
            )
            .unwrap();

        let result = provider.get::<i32>(&sid, &ResourceId::new("bogus").unwrap());
        assert!(matches!(result, Err(ProviderError::InvalidResource { .. })));
    }
}
