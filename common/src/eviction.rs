use lru::LruCache;

/// Recency list of chunk ids bounded by `capacity`. It only decides which id
/// has to go; removing the bytes is up to the caller.
pub struct EvictionTracker {
    capacity: usize,
    ids: LruCache<String, ()>,
}

impl EvictionTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ids: LruCache::unbounded(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Marks a tracked id as most recently used. Untracked ids are ignored.
    pub fn touch(&mut self, id: &str) {
        self.ids.promote(id);
    }

    /// Tracks `id` as most recently used, inserting it if needed.
    pub fn push(&mut self, id: &str) {
        if self.ids.contains(id) {
            self.ids.promote(id);
        } else {
            self.ids.put(id.to_owned(), ());
        }
    }

    /// Removes and returns the least recently used id once the tracker is at
    /// capacity. Call before the matching `push`.
    pub fn pop(&mut self) -> Option<String> {
        if self.ids.len() < self.capacity {
            return None;
        }
        self.ids.pop_lru().map(|(id, _)| id)
    }

    /// Ids from least to most recently used.
    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().rev().map(|(id, _)| id.clone()).collect()
    }
}
