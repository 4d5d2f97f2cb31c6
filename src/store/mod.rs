//! Document store implementations

mod memory;
mod traits;

pub use memory::MemoryDocumentStore;
pub use traits::{Collection, Document, DocumentStore, WriteSummary, ID_FIELD};

#[cfg(feature = "redis-store")]
mod redis_store;

#[cfg(feature = "redis-store")]
pub use redis_store::RedisDocumentStore;
