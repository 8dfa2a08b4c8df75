mod chunk_cache;
mod chunk_manager;
mod chunk_store;
mod download;
mod error;
mod eviction;
mod fetch;
mod object;
mod option;
mod runtime;

pub use chunk_cache::*;
pub use chunk_manager::*;
pub use chunk_store::*;
pub use download::*;
pub use error::*;
pub use eviction::*;
pub use fetch::*;
pub use object::*;
pub use option::*;
pub use runtime::*;
