use super::MetaError;

use std::fmt::Debug;
use std::str::FromStr;

/// Store is the interface to the metadata backend.
///
/// Data lives in named trees of ordered byte keys. Writes that touch a record
/// and its index entries must go through [`Store::write_batch`] so they land
/// atomically; single-key writes on a tree are atomic on their own.
pub trait Store: Send + Sync + Debug + 'static {
    /// Returns the tree with the given name, creating it if needed.
    fn tree_open(&self, name: &str) -> Result<Box<dyn BaseMetaTree>, MetaError>;

    /// Applies all operations of the batch atomically.
    fn write_batch(&self, batch: WriteBatch) -> Result<(), MetaError>;

    /// Returns the number of keys in the given tree.
    fn num_keys(&self, name: &str) -> Result<usize, MetaError>;

    /// Returns the disk space used by the store, in bytes.
    fn disk_space(&self) -> u64;
}

/// BaseMetaTree provides basic tree operations for metadata storage.
pub trait BaseMetaTree: Send + Sync {
    /// Inserts a key-value pair into the tree.
    fn insert(&self, key: &[u8], value: Vec<u8>) -> Result<(), MetaError>;

    /// Removes a key from the tree.
    fn remove(&self, key: &[u8]) -> Result<(), MetaError>;

    /// Gets the value associated with the given key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, MetaError>;

    /// Returns the greatest key in the tree.
    fn last_key(&self) -> Result<Option<Vec<u8>>, MetaError>;

    /// Returns keys starting with `prefix` in descending order, skipping the
    /// first `skip` and yielding at most `limit`.
    fn keys_with_prefix_rev(
        &self,
        prefix: &[u8],
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Vec<u8>>, MetaError>;

    /// Counts the keys starting with `prefix`.
    fn count_prefix(&self, prefix: &[u8]) -> Result<usize, MetaError>;
}

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Insert {
        tree: String,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Remove {
        tree: String,
        key: Vec<u8>,
    },
}

/// Group of writes across trees, applied all-or-nothing.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tree: &str, key: impl Into<Vec<u8>>, value: Vec<u8>) -> &mut Self {
        self.ops.push(BatchOp::Insert {
            tree: tree.to_string(),
            key: key.into(),
            value,
        });
        self
    }

    pub fn remove(&mut self, tree: &str, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Remove {
            tree: tree.to_string(),
            key: key.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    Buffer,
    Fsync,
    Fdatasync,
}

impl FromStr for Durability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buffer" => Ok(Durability::Buffer),
            "fsync" => Ok(Durability::Fsync),
            "fdatasync" => Ok(Durability::Fdatasync),
            _ => Err(format!("Unknown durability option: {}", s)),
        }
    }
}

/// Backend selected for metadata storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageEngine {
    Fjall,
    Memory,
}

impl FromStr for StorageEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fjall" => Ok(StorageEngine::Fjall),
            "memory" => Ok(StorageEngine::Memory),
            _ => Err(format!("Unknown metadata db: {}", s)),
        }
    }
}
