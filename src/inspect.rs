use anyhow::Result;
use std::path::PathBuf;

use crate::auth::UserStore;
use crate::links::LinkStore;
use crate::metastore::{open_store, StorageEngine};

pub fn num_users(db_path: PathBuf, storage_engine: StorageEngine) -> Result<usize> {
    let store = open_store(storage_engine, db_path, None)?;
    let user_store = UserStore::new(store)?;
    Ok(user_store.count_users()?)
}

pub fn num_links(db_path: PathBuf, storage_engine: StorageEngine) -> Result<usize> {
    let store = open_store(storage_engine, db_path, None)?;
    let link_store = LinkStore::new(store)?;
    Ok(link_store.count_all()?)
}

pub fn disk_space(db_path: PathBuf, storage_engine: StorageEngine) -> Result<u64> {
    let store = open_store(storage_engine, db_path, None)?;
    Ok(store.disk_space())
}

/// Prints every account with its link count
pub fn list_users(db_path: PathBuf, storage_engine: StorageEngine) -> Result<()> {
    let store = open_store(storage_engine, db_path, None)?;
    let user_store = UserStore::new(store.clone())?;
    let link_store = LinkStore::new(store)?;

    let users = user_store.list_users()?;
    if users.is_empty() {
        println!("No users found");
        return Ok(());
    }

    println!("{:<8} {:<40} {:>8}  {}", "ID", "EMAIL", "LINKS", "CREATED");
    for user in &users {
        let created = chrono::DateTime::from_timestamp(user.created_at as i64, 0)
            .unwrap_or_default()
            .format("%Y-%m-%d %H:%M:%S UTC");
        println!(
            "{:<8} {:<40} {:>8}  {}",
            user.user_id,
            user.email,
            link_store.count_links(user.user_id)?,
            created
        );
    }
    println!("\nTotal users: {}", users.len());

    Ok(())
}
