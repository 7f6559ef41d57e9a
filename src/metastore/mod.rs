mod errors;
mod fjall_store;
mod memory_store;
mod sequence;
mod traits;

use std::path::PathBuf;
use std::sync::Arc;

pub use errors::MetaError;
pub use fjall_store::FjallStore;
pub use memory_store::MemoryStore;
pub use sequence::{decode_id, encode_id, IdSequence};
pub use traits::{BaseMetaTree, BatchOp, Durability, StorageEngine, Store, WriteBatch};

/// Opens the metadata store selected by `engine`.
///
/// `path` is ignored for the in-memory engine.
pub fn open_store(
    engine: StorageEngine,
    path: PathBuf,
    durability: Option<Durability>,
) -> Result<Arc<dyn Store>, MetaError> {
    match engine {
        StorageEngine::Fjall => Ok(Arc::new(FjallStore::open(path, durability)?)),
        StorageEngine::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
