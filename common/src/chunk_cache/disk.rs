use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sha2::{Digest, Sha256};
use super::cache::ChunkCache;
use super::keyed_lock::KeyedLock;

/// Stores every chunk as one file under `cache_dir`, named by the hex sha256
/// of the chunk id.
pub struct ChunkCacheOnDisk {
    cache_dir: PathBuf,
    locks: KeyedLock,
}

impl ChunkCacheOnDisk {
    pub fn new(cache_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let cache_dir = cache_dir.as_ref();
        fs::create_dir_all(cache_dir)?;
        let cache_dir = fs::canonicalize(cache_dir)?;
        log::debug!("chunk cache on disk: {}", cache_dir.display());
        Ok(Self {
            cache_dir,
            locks: KeyedLock::new(),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn file_path(&self, id: &str) -> PathBuf {
        self.cache_dir.join(hex::encode(Sha256::digest(id.as_bytes())))
    }

    /// Chunks are written here first and renamed into place when complete.
    fn temp_path(&self, id: &str) -> PathBuf {
        self.file_path(id).with_extension("tmp")
    }

    fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(data)?;
        file.sync_all()
    }
}

impl ChunkCache for ChunkCacheOnDisk {
    fn clear(&self) -> std::io::Result<()> {
        match fs::remove_dir_all(&self.cache_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::create_dir_all(&self.cache_dir)
    }

    fn load(&self, id: &str) -> Option<Arc<Vec<u8>>> {
        let _guard = self.locks.read(id);
        let mut file = fs::File::open(self.file_path(id)).ok()?;
        let mut data = Vec::new();
        if let Err(e) = file.read_to_end(&mut data) {
            log::warn!("error reading chunk {}, err: {}", id, e);
            return None;
        }
        if data.is_empty() {
            return None;
        }
        Some(Arc::new(data))
    }

    fn store(&self, id: &str, data: Arc<Vec<u8>>) -> std::io::Result<()> {
        let _guard = self.locks.write(id);
        let temp_path = self.temp_path(id);
        let result = Self::write_file(&temp_path, &data)
            .and_then(|_| fs::rename(&temp_path, self.file_path(id)));
        if let Err(e) = result {
            log::warn!("error writing chunk {}, err: {}", id, e);
            // a partial write must never be loaded as a hit
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, id: &str) -> std::io::Result<()> {
        let _guard = self.locks.write(id);
        fs::remove_file(self.file_path(id))
    }
}
