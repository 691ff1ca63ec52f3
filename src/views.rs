use std::sync::Arc;

use crate::handle::LoadHandle;
use crate::ids::ResourceId;

/// A resolved resource paired with the id it was loaded under.
pub struct ResourceView<R> {
    pub id: ResourceId,
    pub resource: Arc<R>,
}

/// A resource load that may still be in flight, paired with the id it was
/// requested under.
#[derive(Clone)]
pub struct AsyncResourceView<R> {
    pub id: ResourceId,
    pub handle: LoadHandle<R>,
}
