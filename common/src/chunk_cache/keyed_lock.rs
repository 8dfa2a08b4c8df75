use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock};

type KeyLock = Arc<RwLock<()>>;

/// A table of reader/writer locks, one per key. Guards on different keys never
/// contend; entries are dropped once the last guard for a key is released.
#[derive(Default)]
pub struct KeyedLock {
    locks: Mutex<HashMap<String, KeyLock>>,
}

// guards are only held for their drop
#[allow(dead_code)]
enum Held {
    Read(ArcRwLockReadGuard<RawRwLock, ()>),
    Write(ArcRwLockWriteGuard<RawRwLock, ()>),
}

pub struct KeyedGuard<'a> {
    owner: &'a KeyedLock,
    key: String,
    held: Option<Held>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> KeyLock {
        self.locks.lock()
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    pub fn read(&self, key: &str) -> KeyedGuard<'_> {
        let lock = self.entry(key);
        let held = Held::Read(lock.read_arc());
        KeyedGuard { owner: self, key: key.to_owned(), held: Some(held) }
    }

    pub fn write(&self, key: &str) -> KeyedGuard<'_> {
        let lock = self.entry(key);
        let held = Held::Write(lock.write_arc());
        KeyedGuard { owner: self, key: key.to_owned(), held: Some(held) }
    }

    /// Number of keys with a live guard or waiter.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.owner.locks.lock();
        drop(self.held.take());
        // only the table itself still references the lock
        if locks.get(&self.key).map_or(false, |lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.key);
        }
    }
}
