use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use crate::chunk_cache::AnyChunkCache;
use crate::chunk_manager::{chunk_id, chunk_offset, slice_chunk, ChunkManager, ChunkProvider};
use crate::chunk_store::ChunkStore;
use crate::error::{Error, Result};
use crate::fetch::{fetch_chunk, HttpRangeFetcher, RangeFetcher, ThrottleBackoff};
use crate::object::RemoteObject;
use crate::option::DriveOption;
use crate::runtime::with_thread_local_runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    High,
    Low,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::High => write!(f, "high"),
            Lane::Low => write!(f, "low"),
        }
    }
}

struct DownloadRequest {
    object: Arc<RemoteObject>,
    offset: u64,
    size: u64,
    // read-ahead requests have nobody waiting
    response: Option<oneshot::Sender<Result<Vec<u8>>>>,
}

impl DownloadRequest {
    fn respond(self, result: Result<Vec<u8>>) {
        match self.response {
            Some(sender) => {
                // the caller may have gone away
                let _ = sender.send(result);
            }
            None => {
                if let Err(e) = result {
                    log::debug!("read-ahead of {} at {} failed: {}", self.object, self.offset, e);
                }
            }
        }
    }
}

type RequestQueue = Arc<AsyncMutex<mpsc::UnboundedReceiver<DownloadRequest>>>;

struct CoordinatorInner<P: ChunkProvider, F: RangeFetcher> {
    provider: Arc<P>,
    fetcher: Arc<F>,
    // chunk ids with a network fetch in flight
    pending: Mutex<HashSet<String>>,
    read_ahead: usize,
    throttle_unit: Duration,
    max_throttle_units: u64,
    pending_poll_interval: Duration,
}

/// Serves byte range reads of remote objects through the chunk cache. Misses
/// are fetched by per-lane workers: foreground reads on the high lane,
/// read-ahead on the low lane. Only one fetch per chunk runs at a time.
pub struct DownloadCoordinator<P: ChunkProvider, F: RangeFetcher> {
    inner: Arc<CoordinatorInner<P, F>>,
    high: mpsc::UnboundedSender<DownloadRequest>,
    low: mpsc::UnboundedSender<DownloadRequest>,
}

impl<P: ChunkProvider, F: RangeFetcher> Clone for DownloadCoordinator<P, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            high: self.high.clone(),
            low: self.low.clone(),
        }
    }
}

pub type DriveCoordinator = DownloadCoordinator<ChunkManager<AnyChunkCache>, HttpRangeFetcher>;

/// Builds the cache stack described by `option` and starts a coordinator on
/// top of it. Without a `client` one is built honoring the request timeout.
pub fn open(option: &DriveOption, client: Option<reqwest::Client>) -> anyhow::Result<DriveCoordinator> {
    option.validate()?;
    let cache = option.open_chunk_cache()?;
    let manager = ChunkManager::new(option.chunk_size, ChunkStore::new(cache, option.max_chunks))?;
    if option.clear_on_start {
        manager.clear()?;
    }
    let fetcher = match client {
        Some(client) => HttpRangeFetcher::new(client),
        None => HttpRangeFetcher::with_timeout(option.request_timeout())?,
    };
    Ok(DownloadCoordinator::new(option, Arc::new(manager), Arc::new(fetcher))?)
}

impl<P: ChunkProvider, F: RangeFetcher> DownloadCoordinator<P, F> {
    /// Spawns the lane workers on the current tokio runtime.
    pub fn new(option: &DriveOption, provider: Arc<P>, fetcher: Arc<F>) -> Result<Self> {
        option.validate()?;
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::Config("download coordinator must be created inside a tokio runtime".to_string()))?;

        let inner = Arc::new(CoordinatorInner {
            provider,
            fetcher,
            pending: Mutex::new(HashSet::new()),
            read_ahead: option.read_ahead,
            throttle_unit: option.throttle_unit(),
            max_throttle_units: option.max_throttle_units,
            pending_poll_interval: option.pending_poll_interval(),
        });

        let (high, high_rx) = mpsc::unbounded_channel();
        let (low, low_rx) = mpsc::unbounded_channel();
        for (lane, rx) in [(Lane::High, high_rx), (Lane::Low, low_rx)] {
            let queue: RequestQueue = Arc::new(AsyncMutex::new(rx));
            for worker in 0..option.workers_per_lane {
                handle.spawn(inner.clone().run_lane(queue.clone(), lane, worker));
            }
        }

        Ok(Self { inner, high, low })
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.inner.provider
    }

    /// Number of chunks currently being fetched.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Reads `size` bytes at `offset`, never past the end of the chunk that
    /// holds `offset`, and queues read-ahead of the following chunks.
    pub async fn read_high_priority(&self, object: Arc<RemoteObject>, offset: u64, size: u64) -> Result<Vec<u8>> {
        let (sender, receiver) = oneshot::channel();
        self.high.send(DownloadRequest {
            object: object.clone(),
            offset,
            size,
            response: Some(sender),
        }).map_err(|_| Error::Closed)?;

        self.queue_read_ahead(&object, offset, size);

        receiver.await.map_err(|_| Error::Closed)?
    }

    /// Blocking variant of [`Self::read_high_priority`] for synchronous callers.
    pub fn read_blocking(&self, object: Arc<RemoteObject>, offset: u64, size: u64) -> Result<Vec<u8>> {
        with_thread_local_runtime(self.read_high_priority(object, offset, size))
            .map_err(Error::Runtime)?
    }

    fn queue_read_ahead(&self, object: &Arc<RemoteObject>, offset: u64, size: u64) {
        let chunk_size = self.inner.provider.chunk_size();
        for next in read_ahead_offsets(offset, chunk_size, object.size, self.inner.read_ahead) {
            let queued = self.low.send(DownloadRequest {
                object: object.clone(),
                offset: next,
                size,
                response: None,
            });
            if queued.is_err() {
                break;
            }
        }
    }
}

/// Start offsets of up to `count` chunks following the chunk holding `offset`.
/// Stops at `object_size` or when the next offset would not fit in a u64.
fn read_ahead_offsets(offset: u64, chunk_size: u64, object_size: u64, count: usize) -> Vec<u64> {
    let mut offsets = Vec::new();
    let mut next = chunk_offset(offset, chunk_size).checked_add(chunk_size);
    while let Some(start) = next {
        if offsets.len() >= count || start >= object_size {
            break;
        }
        offsets.push(start);
        next = start.checked_add(chunk_size);
    }
    offsets
}

impl<P: ChunkProvider, F: RangeFetcher> CoordinatorInner<P, F> {
    async fn run_lane(self: Arc<Self>, queue: RequestQueue, lane: Lane, worker: usize) {
        loop {
            // holding the queue while waiting keeps dequeue order FIFO across workers
            let request = queue.lock().await.recv().await;
            match request {
                Some(request) => self.handle(request, lane).await,
                None => break,
            }
        }
        log::debug!("{} priority download worker {} exits", lane, worker);
    }

    async fn handle(&self, request: DownloadRequest, lane: Lane) {
        let chunk_size = self.provider.chunk_size();
        let chunk_start = chunk_offset(request.offset, chunk_size);
        let id = chunk_id(&request.object, request.offset, chunk_size);

        loop {
            match self.provider.get_chunk(&request.object, request.offset, request.size) {
                Ok(data) => {
                    request.respond(Ok(data));
                    return;
                }
                Err(e) => log::trace!("{}", e),
            }

            if self.pending.lock().insert(id.clone()) {
                break;
            }
            log::debug!("chunk {} already downloading, waiting...", id);
            tokio::time::sleep(self.pending_poll_interval).await;
        }

        let backoff = ThrottleBackoff::new(self.throttle_unit, self.max_throttle_units);
        let result = fetch_chunk(
            self.fetcher.as_ref(),
            &request.object,
            chunk_start,
            chunk_size,
            backoff,
            lane == Lane::High,
        ).await;

        let result = result.map(|data| {
            let data = Arc::new(data);
            if let Err(e) = self.provider.store_chunk(&request.object, request.offset, data.clone()) {
                log::warn!("could not cache chunk {}, err: {}", id, e);
            }
            slice_chunk(&data, request.offset - chunk_start, request.size).to_vec()
        });
        self.pending.lock().remove(&id);
        request.respond(result);
    }
}
