#![warn(missing_docs)]
//! RankBench Store - Keyed Result Cache
//!
//! Explicit compute-once-else-load storage for benchmark sessions:
//! - Entries keyed by (session identity, field name)
//! - Pluggable [`Codec`] (JSON, TOML) and [`Backend`] (memory, directory)
//! - Estimate snapshots for resuming an interrupted refinement

mod backend;
mod cache;
mod codec;
mod snapshot;

pub use backend::{Backend, DirBackend, MemoryBackend};
pub use cache::{Cache, CacheKey, SessionId, StoreError};
pub use codec::{Codec, JsonCodec, TomlCodec};
pub use snapshot::{ESTIMATES_FIELD, EstimateStore, SessionSnapshot};
