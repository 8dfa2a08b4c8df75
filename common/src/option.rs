use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::Context;
use serde::Deserialize;
use crate::chunk_cache::{AnyChunkCache, ChunkCacheInMem, ChunkCacheOnDisk};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ChunkCacheKind {
    Memory,
    Disk { dir: PathBuf },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriveOption {
    pub chunk_size: u64,
    pub max_chunks: usize,
    pub read_ahead: usize,
    pub workers_per_lane: usize,
    pub cache: ChunkCacheKind,
    pub clear_on_start: bool,
    pub throttle_unit_ms: u64,
    pub max_throttle_units: u64,
    pub pending_poll_ms: u64,
    pub request_timeout_ms: Option<u64>,
}

impl Default for DriveOption {
    fn default() -> Self {
        Self {
            chunk_size: 10 * 1024 * 1024,
            max_chunks: 100,
            read_ahead: 3,
            workers_per_lane: 1,
            cache: ChunkCacheKind::Memory,
            clear_on_start: true,
            throttle_unit_ms: 1000,
            max_throttle_units: 8,
            pending_poll_ms: 100,
            request_timeout_ms: None,
        }
    }
}

impl DriveOption {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read option file {}", path.display()))?;
        let option: Self = serde_json::from_str(&content)
            .with_context(|| format!("parse option file {}", path.display()))?;
        option.validate()?;
        Ok(option)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers_per_lane < 1 {
            return Err(Error::Config("number of workers per lane must not be < 1".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk size must not be 0".to_string()));
        }
        Ok(())
    }

    pub fn throttle_unit(&self) -> Duration {
        Duration::from_millis(self.throttle_unit_ms)
    }

    pub fn pending_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pending_poll_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn open_chunk_cache(&self) -> std::io::Result<AnyChunkCache> {
        match &self.cache {
            ChunkCacheKind::Memory => Ok(AnyChunkCache::Memory(ChunkCacheInMem::new())),
            ChunkCacheKind::Disk { dir } => Ok(AnyChunkCache::Disk(ChunkCacheOnDisk::new(dir)?)),
        }
    }
}
