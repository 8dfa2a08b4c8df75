use std::cmp::min;
use std::sync::Arc;
use crate::chunk_cache::ChunkCache;
use crate::chunk_store::ChunkStore;
use crate::error::{Error, Result};
use crate::object::RemoteObject;

/// What the download coordinator needs from the cache side.
pub trait ChunkProvider: Send + Sync + 'static {
    fn chunk_size(&self) -> u64;

    /// Bytes `offset..offset + size` of `object`, limited to the chunk holding
    /// `offset`. Fails with [`Error::ChunkMiss`] when that chunk is not cached.
    fn get_chunk(&self, object: &RemoteObject, offset: u64, size: u64) -> Result<Vec<u8>>;

    /// Caches a whole chunk; `offset` may point anywhere inside it.
    fn store_chunk(&self, object: &RemoteObject, offset: u64, data: Arc<Vec<u8>>) -> Result<()>;
}

pub fn chunk_offset(offset: u64, chunk_size: u64) -> u64 {
    offset - offset % chunk_size
}

pub fn chunk_id(object: &RemoteObject, offset: u64, chunk_size: u64) -> String {
    format!("{}:{}", object.id, chunk_offset(offset, chunk_size))
}

/// Part of a whole chunk that answers a read at `offset_in_chunk`, clamped to
/// the chunk's actual length.
pub fn slice_chunk(data: &[u8], offset_in_chunk: u64, size: u64) -> &[u8] {
    let start = min(offset_in_chunk, data.len() as u64) as usize;
    let end = min(offset_in_chunk.saturating_add(size), data.len() as u64) as usize;
    &data[start..end]
}

pub struct ChunkManager<C: ChunkCache> {
    chunk_size: u64,
    store: ChunkStore<C>,
}

impl<C: ChunkCache> ChunkManager<C> {
    pub fn new(chunk_size: u64, store: ChunkStore<C>) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk size must not be 0".to_string()));
        }
        Ok(Self { chunk_size, store })
    }

    pub fn store(&self) -> &ChunkStore<C> {
        &self.store
    }

    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }
}

impl<C: ChunkCache> ChunkProvider for ChunkManager<C> {
    fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    fn get_chunk(&self, object: &RemoteObject, offset: u64, size: u64) -> Result<Vec<u8>> {
        let id = chunk_id(object, offset, self.chunk_size);
        match self.store.load(&id) {
            Some(data) => {
                log::trace!("chunk cache hit: {}", id);
                Ok(slice_chunk(&data, offset % self.chunk_size, size).to_vec())
            }
            None => Err(Error::ChunkMiss(id)),
        }
    }

    fn store_chunk(&self, object: &RemoteObject, offset: u64, data: Arc<Vec<u8>>) -> Result<()> {
        let id = chunk_id(object, offset, self.chunk_size);
        log::trace!("store chunk: {}, size: {}", id, data.len());
        self.store.store(&id, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_cache::ChunkCacheInMem;

    fn object() -> RemoteObject {
        RemoteObject::new("file-1", "movie.mkv", 40, "http://localhost/file-1")
    }

    fn manager(max_chunks: usize) -> ChunkManager<ChunkCacheInMem> {
        ChunkManager::new(16, ChunkStore::new(ChunkCacheInMem::new(), max_chunks)).unwrap()
    }

    #[test]
    fn test_chunk_id() {
        assert_eq!(chunk_id(&object(), 0, 16), "file-1:0");
        assert_eq!(chunk_id(&object(), 15, 16), "file-1:0");
        assert_eq!(chunk_id(&object(), 33, 16), "file-1:32");
    }

    #[test]
    fn test_slice_chunk() {
        let data: Vec<u8> = (0..8).collect();
        assert_eq!(slice_chunk(&data, 2, 3), &[2, 3, 4]);
        assert_eq!(slice_chunk(&data, 6, 10), &[6, 7]);
        assert_eq!(slice_chunk(&data, 9, 1), &[] as &[u8]);
        assert_eq!(slice_chunk(&data, 0, u64::MAX), data.as_slice());
    }

    #[test]
    fn test_get_and_store() {
        let manager = manager(4);
        let object = object();
        let err = manager.get_chunk(&object, 20, 4).unwrap_err();
        assert!(matches!(err, Error::ChunkMiss(ref id) if id == "file-1:16"));

        manager.store_chunk(&object, 20, Arc::new((16..32).collect())).unwrap();
        assert_eq!(manager.get_chunk(&object, 20, 4).unwrap(), vec![20, 21, 22, 23]);
        assert_eq!(manager.get_chunk(&object, 30, 8).unwrap(), vec![30, 31]);

        // short final chunk
        manager.store_chunk(&object, 32, Arc::new((32..40).collect())).unwrap();
        assert_eq!(manager.get_chunk(&object, 38, 16).unwrap(), vec![38, 39]);
    }

    #[test]
    fn test_zero_chunk_size() {
        let store = ChunkStore::new(ChunkCacheInMem::new(), 1);
        assert!(matches!(ChunkManager::new(0, store), Err(Error::Config(_))));
    }
}
