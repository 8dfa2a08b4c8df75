use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use super::cache::ChunkCache;

#[derive(Default)]
pub struct ChunkCacheInMem {
    chunks: RwLock<HashMap<String, Arc<Vec<u8>>>>,
}

impl ChunkCacheInMem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }
}

impl ChunkCache for ChunkCacheInMem {
    fn clear(&self) -> std::io::Result<()> {
        self.chunks.write().clear();
        Ok(())
    }

    fn load(&self, id: &str) -> Option<Arc<Vec<u8>>> {
        self.chunks.read().get(id).cloned()
    }

    fn store(&self, id: &str, data: Arc<Vec<u8>>) -> std::io::Result<()> {
        self.chunks.write().insert(id.to_owned(), data);
        Ok(())
    }

    fn remove(&self, id: &str) -> std::io::Result<()> {
        self.chunks.write().remove(id);
        Ok(())
    }
}
