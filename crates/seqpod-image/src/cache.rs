use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard},
};

use lru::LruCache;

use crate::{ImageInfo, ImageReference};

/// Default number of images kept.
pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded, shared map from image reference to resolved metadata.
///
/// Clones share the same storage. Lookups refresh recency; inserting into a full cache evicts
/// the least recently used entry.
#[derive(Debug, Clone)]
pub struct ImageCache {
    inner: Arc<Mutex<LruCache<ImageReference, Arc<ImageInfo>>>>,
}

impl ImageCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Capacity `0` is treated as `1`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn get(&self, image: &ImageReference) -> Option<Arc<ImageInfo>> {
        self.lock().get(image).cloned()
    }

    pub fn insert(&self, info: Arc<ImageInfo>) {
        self.lock().put(info.reference.clone(), info);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<ImageReference, Arc<ImageInfo>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
