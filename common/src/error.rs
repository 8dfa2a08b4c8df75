use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid option: {0}")]
    Config(String),

    #[error("chunk cache io failed for {id}: {source}")]
    CacheIo {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("chunk {0} is not cached")]
    ChunkMiss(String),

    #[error("could not request object {object} from API: {source}")]
    Transport {
        object: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("wrong status code {status} for object {object}")]
    Status { object: String, status: u16 },

    #[error("could not read object {object} / status code: 403, body: {body}")]
    Forbidden { object: String, body: String },

    #[error("maximum throttle interval has been reached for object {object}")]
    ThrottleExhausted { object: String },

    #[error("download coordinator is closed")]
    Closed,

    #[error("could not drive blocking read: {0}")]
    Runtime(#[source] std::io::Error),
}

impl Error {
    pub(crate) fn cache_io(id: &str, source: std::io::Error) -> Self {
        Self::CacheIo {
            id: id.to_owned(),
            source,
        }
    }
}
