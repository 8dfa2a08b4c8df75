use std::sync::Arc;

/// Raw chunk persistence keyed by chunk id. Implementations hold no eviction
/// logic; capacity is enforced by [`crate::ChunkStore`].
pub trait ChunkCache: Send + Sync + 'static {
    /// Drops every stored chunk. Only called on startup.
    fn clear(&self) -> std::io::Result<()>;
    /// Returns the stored bytes, `None` when the id is unknown or unreadable.
    fn load(&self, id: &str) -> Option<Arc<Vec<u8>>>;
    fn store(&self, id: &str, data: Arc<Vec<u8>>) -> std::io::Result<()>;
    fn remove(&self, id: &str) -> std::io::Result<()>;
}
