use std::collections::HashMap;
use std::path::PathBuf;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::debug;

use super::{BaseMetaTree, BatchOp, Durability, MetaError, Store, WriteBatch};

/// Metadata store backed by an embedded fjall keyspace
pub struct FjallStore {
    keyspace: Keyspace,
    durability: Option<PersistMode>,
}

impl std::fmt::Debug for FjallStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FjallStore")
            .field("durability", &self.durability)
            .finish()
    }
}

impl FjallStore {
    /// Opens (or creates) the keyspace at `path`.
    ///
    /// `durability` selects how writes are flushed; `None` or
    /// `Some(Durability::Buffer)` leaves flushing to fjall.
    pub fn open(path: PathBuf, durability: Option<Durability>) -> Result<Self, MetaError> {
        debug!("Opening fjall keyspace at {}", path.display());
        let keyspace = Config::new(&path)
            .open()
            .map_err(|e| MetaError::OpenFailed(format!("{}: {}", path.display(), e)))?;

        let durability = match durability {
            Some(Durability::Fsync) => Some(PersistMode::SyncAll),
            Some(Durability::Fdatasync) => Some(PersistMode::SyncData),
            Some(Durability::Buffer) | None => None,
        };

        Ok(Self {
            keyspace,
            durability,
        })
    }

    fn partition(&self, name: &str) -> Result<PartitionHandle, MetaError> {
        Ok(self
            .keyspace
            .open_partition(name, PartitionCreateOptions::default())?)
    }

    fn persist(&self) -> Result<(), MetaError> {
        if let Some(mode) = self.durability {
            self.keyspace.persist(mode)?;
        }
        Ok(())
    }
}

impl Store for FjallStore {
    fn tree_open(&self, name: &str) -> Result<Box<dyn BaseMetaTree>, MetaError> {
        Ok(Box::new(FjallTree {
            partition: self.partition(name)?,
            keyspace: self.keyspace.clone(),
            durability: self.durability,
        }))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), MetaError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut partitions: HashMap<String, PartitionHandle> = HashMap::new();
        let mut fjall_batch = self.keyspace.batch();

        for op in batch.into_ops() {
            match op {
                BatchOp::Insert { tree, key, value } => {
                    if !partitions.contains_key(&tree) {
                        let handle = self.partition(&tree)?;
                        partitions.insert(tree.clone(), handle);
                    }
                    if let Some(partition) = partitions.get(&tree) {
                        fjall_batch.insert(partition, key, value);
                    }
                }
                BatchOp::Remove { tree, key } => {
                    if !partitions.contains_key(&tree) {
                        let handle = self.partition(&tree)?;
                        partitions.insert(tree.clone(), handle);
                    }
                    if let Some(partition) = partitions.get(&tree) {
                        fjall_batch.remove(partition, key);
                    }
                }
            }
        }

        fjall_batch.commit()?;
        self.persist()
    }

    fn num_keys(&self, name: &str) -> Result<usize, MetaError> {
        Ok(self.partition(name)?.len()?)
    }

    fn disk_space(&self) -> u64 {
        self.keyspace.disk_space()
    }
}

struct FjallTree {
    partition: PartitionHandle,
    keyspace: Keyspace,
    durability: Option<PersistMode>,
}

impl FjallTree {
    fn persist(&self) -> Result<(), MetaError> {
        if let Some(mode) = self.durability {
            self.keyspace.persist(mode)?;
        }
        Ok(())
    }
}

impl BaseMetaTree for FjallTree {
    fn insert(&self, key: &[u8], value: Vec<u8>) -> Result<(), MetaError> {
        self.partition.insert(key, value)?;
        self.persist()
    }

    fn remove(&self, key: &[u8]) -> Result<(), MetaError> {
        self.partition.remove(key)?;
        self.persist()
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, MetaError> {
        Ok(self.partition.get(key)?.map(|v| v.to_vec()))
    }

    fn last_key(&self) -> Result<Option<Vec<u8>>, MetaError> {
        Ok(self
            .partition
            .last_key_value()?
            .map(|(key, _value)| key.to_vec()))
    }

    fn keys_with_prefix_rev(
        &self,
        prefix: &[u8],
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Vec<u8>>, MetaError> {
        let mut keys = Vec::new();
        for item in self.partition.prefix(prefix).rev().skip(skip).take(limit) {
            let (key, _value) = item?;
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    fn count_prefix(&self, prefix: &[u8]) -> Result<usize, MetaError> {
        let mut count = 0;
        for item in self.partition.prefix(prefix) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}
