use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use super::{BaseMetaTree, BatchOp, MetaError, Store, WriteBatch};

type Tree = Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>;

/// Volatile metadata store, used by tests and `--metadata-db memory`
#[derive(Debug, Default)]
pub struct MemoryStore {
    trees: RwLock<HashMap<String, Tree>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tree(&self, name: &str) -> Tree {
        if let Some(tree) = self.trees.read().unwrap_or_else(|e| e.into_inner()).get(name) {
            return tree.clone();
        }
        let mut trees = self.trees.write().unwrap_or_else(|e| e.into_inner());
        trees.entry(name.to_string()).or_default().clone()
    }
}

impl Store for MemoryStore {
    fn tree_open(&self, name: &str) -> Result<Box<dyn BaseMetaTree>, MetaError> {
        Ok(Box::new(MemoryTree(self.tree(name))))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), MetaError> {
        let ops = batch.into_ops();

        // Take every affected tree lock before mutating so readers never see
        // half a batch. Locks are taken in name order.
        let mut names: Vec<&str> = ops
            .iter()
            .map(|op| match op {
                BatchOp::Insert { tree, .. } | BatchOp::Remove { tree, .. } => tree.as_str(),
            })
            .collect();
        names.sort_unstable();
        names.dedup();

        let handles: Vec<(String, Tree)> = names
            .iter()
            .map(|name| (name.to_string(), self.tree(name)))
            .collect();
        let mut guards: HashMap<&str, _> = handles
            .iter()
            .map(|(name, tree)| (name.as_str(), tree.write().unwrap_or_else(|e| e.into_inner())))
            .collect();

        for op in ops {
            match op {
                BatchOp::Insert { tree, key, value } => {
                    if let Some(guard) = guards.get_mut(tree.as_str()) {
                        guard.insert(key, value);
                    }
                }
                BatchOp::Remove { tree, key } => {
                    if let Some(guard) = guards.get_mut(tree.as_str()) {
                        guard.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    fn num_keys(&self, name: &str) -> Result<usize, MetaError> {
        Ok(self.tree(name).read().unwrap_or_else(|e| e.into_inner()).len())
    }

    fn disk_space(&self) -> u64 {
        0
    }
}

struct MemoryTree(Tree);

impl BaseMetaTree for MemoryTree {
    fn insert(&self, key: &[u8], value: Vec<u8>) -> Result<(), MetaError> {
        self.0
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_vec(), value);
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<(), MetaError> {
        self.0.write().unwrap_or_else(|e| e.into_inner()).remove(key);
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, MetaError> {
        Ok(self.0.read().unwrap_or_else(|e| e.into_inner()).get(key).cloned())
    }

    fn last_key(&self) -> Result<Option<Vec<u8>>, MetaError> {
        Ok(self
            .0
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .next_back()
            .cloned())
    }

    fn keys_with_prefix_rev(
        &self,
        prefix: &[u8],
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Vec<u8>>, MetaError> {
        let tree = self.0.read().unwrap_or_else(|e| e.into_inner());
        Ok(tree
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .skip(skip)
            .take(limit)
            .collect())
    }

    fn count_prefix(&self, prefix: &[u8]) -> Result<usize, MetaError> {
        let tree = self.0.read().unwrap_or_else(|e| e.into_inner());
        Ok(tree
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .count())
    }
}
