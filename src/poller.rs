//! Fire-once completion notification over a batch of loads.

use crate::views::AsyncResourceView;

struct Entry<R> {
    view: AsyncResourceView<R>,
    fired: bool,
}

/// Polls a fixed batch of [`AsyncResourceView`]s and invokes a callback
/// exactly once for each resource that finishes loading successfully.
/// Failed loads are skipped silently. Nothing is spawned; the caller must
/// call [`OnLoaded::poll`] repeatedly (e.g. once per frame/tick) to drive
/// delivery.
pub struct OnLoaded<R, F> {
    entries: Vec<Entry<R>>,
    callback: F,
}

impl<R, F> OnLoaded<R, F>
where
    F: FnMut(&crate::ids::ResourceId, &R),
{
    pub fn new(views: Vec<AsyncResourceView<R>>, callback: F) -> Self {
        Self {
            entries: views
                .into_iter()
                .map(|view| Entry { view, fired: false })
                .collect(),
            callback,
        }
    }

    /// Checks every not-yet-fired entry; for each one that has resolved
    /// successfully since the last call, invokes the callback and marks it
    /// fired.
    pub fn poll(&mut self) {
        for entry in &mut self.entries {
            if entry.fired {
                continue;
            }
            match entry.view.handle.poll() {
                None => {}
                Some(Ok(resource)) => {
                    (self.callback)(&entry.view.id, &resource);
                    entry.fired = true;
                }
                Some(Err(_)) => entry.fired = true,
            }
        }
    }
}
