use std::sync::Arc;
use parking_lot::Mutex;
use crate::chunk_cache::ChunkCache;
use crate::error::{Error, Result};
use crate::eviction::EvictionTracker;

/// A [`ChunkCache`] bounded to a fixed number of chunks, evicting the least
/// recently used chunk on store.
pub struct ChunkStore<C: ChunkCache> {
    cache: C,
    tracker: Mutex<EvictionTracker>,
}

impl<C: ChunkCache> ChunkStore<C> {
    pub fn new(cache: C, max_chunks: usize) -> Self {
        Self {
            cache,
            tracker: Mutex::new(EvictionTracker::new(max_chunks)),
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn capacity(&self) -> usize {
        self.tracker.lock().capacity()
    }

    /// Number of chunks currently counted against the capacity.
    pub fn len(&self) -> usize {
        self.tracker.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the backend and forgets every tracked id.
    pub fn clear(&self) -> Result<()> {
        let mut tracker = self.tracker.lock();
        self.cache.clear().map_err(|e| Error::cache_io("*", e))?;
        *tracker = EvictionTracker::new(tracker.capacity());
        Ok(())
    }

    pub fn load(&self, id: &str) -> Option<Arc<Vec<u8>>> {
        let data = self.cache.load(id)?;
        self.tracker.lock().touch(id);
        Some(data)
    }

    /// Tracker bookkeeping and backend writes happen under one lock so the
    /// backend never holds a chunk the tracker does not know about.
    pub fn store(&self, id: &str, data: Arc<Vec<u8>>) -> Result<()> {
        let mut tracker = self.tracker.lock();
        if !tracker.contains(id) {
            if let Some(evict_id) = tracker.pop() {
                self.remove_evicted(&evict_id);
            }
        }

        // on failure an already tracked id keeps its previous bytes
        self.cache.store(id, data).map_err(|e| Error::cache_io(id, e))?;

        tracker.push(id);
        // a zero capacity store drops the incoming chunk right away
        if tracker.len() > tracker.capacity() {
            if let Some(evict_id) = tracker.pop() {
                self.remove_evicted(&evict_id);
            }
        }
        Ok(())
    }

    fn remove_evicted(&self, evict_id: &str) {
        if let Err(e) = self.cache.remove(evict_id) {
            log::warn!("could not delete chunk {}, err: {}", evict_id, e);
        } else {
            log::debug!("deleted chunk {}", evict_id);
        }
    }
}
