mod cache;
mod disk;
mod keyed_lock;
mod mem;

use std::sync::Arc;

pub use cache::ChunkCache;
pub use disk::ChunkCacheOnDisk;
pub use keyed_lock::{KeyedGuard, KeyedLock};
pub use mem::ChunkCacheInMem;

/// Backend picked at runtime from [`crate::ChunkCacheKind`].
pub enum AnyChunkCache {
    Memory(ChunkCacheInMem),
    Disk(ChunkCacheOnDisk),
}

impl ChunkCache for AnyChunkCache {
    fn clear(&self) -> std::io::Result<()> {
        match self {
            Self::Memory(cache) => cache.clear(),
            Self::Disk(cache) => cache.clear(),
        }
    }

    fn load(&self, id: &str) -> Option<Arc<Vec<u8>>> {
        match self {
            Self::Memory(cache) => cache.load(id),
            Self::Disk(cache) => cache.load(id),
        }
    }

    fn store(&self, id: &str, data: Arc<Vec<u8>>) -> std::io::Result<()> {
        match self {
            Self::Memory(cache) => cache.store(id, data),
            Self::Disk(cache) => cache.store(id, data),
        }
    }

    fn remove(&self, id: &str) -> std::io::Result<()> {
        match self {
            Self::Memory(cache) => cache.remove(id),
            Self::Disk(cache) => cache.remove(id),
        }
    }
}
