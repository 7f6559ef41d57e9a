use std::sync::atomic::{AtomicU64, Ordering};

use super::{MetaError, Store, WriteBatch};

/// Tree holding the last id handed out by each named sequence
pub const SEQUENCES_TREE: &str = "_SEQUENCES";

/// Encodes an id as a big-endian key so byte order equals numeric order.
pub fn encode_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Decodes the first 8 bytes of `bytes` as a big-endian id.
pub fn decode_id(bytes: &[u8]) -> Option<u64> {
    let raw: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
    Some(u64::from_be_bytes(raw))
}

/// Monotonic id allocator with a persisted high-water mark.
///
/// Every allocated id must be recorded with [`IdSequence::record`] in the
/// batch that stores the new record, so ids stay unique across restarts even
/// after the newest records are deleted. Callers serialize allocate-and-commit
/// so the recorded mark never moves backwards.
#[derive(Debug)]
pub struct IdSequence {
    name: String,
    next: AtomicU64,
}

impl IdSequence {
    /// Starts after the greater of the recorded mark for `name` and the last
    /// key of `data_tree`, or at 1 when both are empty.
    pub fn resume(store: &dyn Store, name: &str, data_tree: &str) -> Result<Self, MetaError> {
        let recorded = match store.tree_open(SEQUENCES_TREE)?.get(name.as_bytes())? {
            Some(value) => Some(decode_id(&value).ok_or_else(|| {
                MetaError::Codec(format!("invalid high-water mark for sequence {}", name))
            })?),
            None => None,
        };
        let last_key = match store.tree_open(data_tree)?.last_key()? {
            Some(key) => Some(decode_id(&key).ok_or_else(|| {
                MetaError::Codec(format!("invalid id key of {} bytes", key.len()))
            })?),
            None => None,
        };

        let last = recorded.max(last_key).unwrap_or(0);
        Ok(Self {
            name: name.to_string(),
            next: AtomicU64::new(last + 1),
        })
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Adds the write that persists `id` as this sequence's high-water mark
    pub fn record(&self, batch: &mut WriteBatch, id: u64) {
        batch.insert(SEQUENCES_TREE, self.name.as_bytes(), encode_id(id).to_vec());
    }
}
