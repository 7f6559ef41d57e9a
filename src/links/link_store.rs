use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::auth::user_store::now_secs;
use crate::auth::UserId;
use crate::metastore::{decode_id, encode_id, IdSequence, MetaError, Store, WriteBatch};

const LINKS_TREE: &str = "_LINKS";
const LINKS_BY_OWNER_TREE: &str = "_LINKS_BY_OWNER";
const LINK_SEQUENCE: &str = "links";

pub type LinkId = u64;

/// Editable fields of a link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkFields {
    pub title: String,
    pub url: String,
    pub description: String,
}

/// Link record stored in the database
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct LinkRecord {
    pub id: LinkId,
    pub owner_id: UserId,
    pub title: String,
    pub url: String,
    pub description: String,
    /// Creation timestamp (seconds since UNIX epoch)
    pub created_at: u64,
}

impl LinkRecord {
    pub fn to_vec(&self) -> Result<Vec<u8>, MetaError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| MetaError::Codec(format!("Failed to serialize LinkRecord: {}", e)))
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, MetaError> {
        let (link, _len) = bincode::decode_from_slice(data, bincode::config::standard())
            .map_err(|e| MetaError::Codec(format!("Failed to deserialize LinkRecord: {}", e)))?;
        Ok(link)
    }
}

/// Owner index key: owner id followed by link id, both big-endian, so a
/// reverse prefix scan yields an owner's links newest first.
fn owner_key(owner: UserId, id: LinkId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&encode_id(owner));
    key.extend_from_slice(&encode_id(id));
    key
}

/// Per-user link storage.
///
/// Every lookup and mutation is filtered on both the link id and the owner,
/// so a user can never read or change another user's links. Writes are
/// serialized: an update never lands after a delete of the same link has
/// committed.
pub struct LinkStore {
    store: Arc<dyn Store>,
    ids: IdSequence,
    write_lock: Mutex<()>,
}

impl LinkStore {
    pub fn new(store: Arc<dyn Store>) -> Result<Self, MetaError> {
        let ids = IdSequence::resume(store.as_ref(), LINK_SEQUENCE, LINKS_TREE)?;
        Ok(Self {
            store,
            ids,
            write_lock: Mutex::new(()),
        })
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Creates a link owned by `owner`
    pub fn create_link(&self, owner: UserId, fields: LinkFields) -> Result<LinkRecord, MetaError> {
        let _guard = self.lock_writes();
        let link = LinkRecord {
            id: self.ids.next_id(),
            owner_id: owner,
            title: fields.title,
            url: fields.url,
            description: fields.description,
            created_at: now_secs(),
        };

        let mut batch = WriteBatch::new();
        batch
            .insert(LINKS_TREE, encode_id(link.id).to_vec(), link.to_vec()?)
            .insert(LINKS_BY_OWNER_TREE, owner_key(owner, link.id), Vec::new());
        self.ids.record(&mut batch, link.id);
        self.store.write_batch(batch)?;

        debug!(link_id = link.id, owner, "Created link");
        Ok(link)
    }

    /// Gets a link by id, only if it belongs to `owner`
    pub fn get_link(&self, id: LinkId, owner: UserId) -> Result<Option<LinkRecord>, MetaError> {
        let links_tree = self.store.tree_open(LINKS_TREE)?;
        match links_tree.get(&encode_id(id))? {
            Some(data) => {
                let link = LinkRecord::from_slice(&data)?;
                if link.owner_id == owner {
                    Ok(Some(link))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// Lists `owner`'s links newest first, returning the requested window and
    /// the owner's total link count.
    ///
    /// The count and the window are read separately, so a concurrent write
    /// can make them disagree.
    pub fn list_links(
        &self,
        owner: UserId,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<LinkRecord>, usize), MetaError> {
        let total = self.count_links(owner)?;
        let links = self.fetch_window(owner, offset, limit)?;
        Ok((links, total))
    }

    /// Lists all of `owner`'s links newest first
    pub fn list_all(&self, owner: UserId) -> Result<Vec<LinkRecord>, MetaError> {
        self.fetch_window(owner, 0, usize::MAX)
    }

    fn fetch_window(
        &self,
        owner: UserId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LinkRecord>, MetaError> {
        let index_tree = self.store.tree_open(LINKS_BY_OWNER_TREE)?;
        let links_tree = self.store.tree_open(LINKS_TREE)?;

        let keys = index_tree.keys_with_prefix_rev(&encode_id(owner), offset, limit)?;
        let mut links = Vec::with_capacity(keys.len());
        for key in keys {
            let id = match key.get(8..).and_then(decode_id) {
                Some(id) => id,
                None => {
                    warn!(owner, "Skipping malformed owner index key");
                    continue;
                }
            };
            // Deleted between the index scan and the fetch
            if let Some(data) = links_tree.get(&encode_id(id))? {
                links.push(LinkRecord::from_slice(&data)?);
            }
        }
        Ok(links)
    }

    /// Counts `owner`'s links
    pub fn count_links(&self, owner: UserId) -> Result<usize, MetaError> {
        let index_tree = self.store.tree_open(LINKS_BY_OWNER_TREE)?;
        index_tree.count_prefix(&encode_id(owner))
    }

    /// Counts all links of all users
    pub fn count_all(&self) -> Result<usize, MetaError> {
        self.store.num_keys(LINKS_TREE)
    }

    /// Replaces the fields of link `id` if it belongs to `owner`.
    ///
    /// Returns `false` without writing when no link matches both id and owner.
    pub fn update_link(
        &self,
        id: LinkId,
        owner: UserId,
        fields: LinkFields,
    ) -> Result<bool, MetaError> {
        let _guard = self.lock_writes();
        let mut link = match self.get_link(id, owner)? {
            Some(link) => link,
            None => return Ok(false),
        };

        link.title = fields.title;
        link.url = fields.url;
        link.description = fields.description;

        let links_tree = self.store.tree_open(LINKS_TREE)?;
        links_tree.insert(&encode_id(id), link.to_vec()?)?;

        debug!(link_id = id, owner, "Updated link");
        Ok(true)
    }

    /// Deletes link `id` if it belongs to `owner`.
    ///
    /// Returns `false` without writing when no link matches both id and owner.
    pub fn delete_link(&self, id: LinkId, owner: UserId) -> Result<bool, MetaError> {
        let _guard = self.lock_writes();
        if self.get_link(id, owner)?.is_none() {
            return Ok(false);
        }

        let mut batch = WriteBatch::new();
        batch
            .remove(LINKS_TREE, encode_id(id).to_vec())
            .remove(LINKS_BY_OWNER_TREE, owner_key(owner, id));
        self.store.write_batch(batch)?;

        debug!(link_id = id, owner, "Deleted link");
        Ok(true)
    }
}
