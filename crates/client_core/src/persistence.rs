//! SQLite-backed collaborators.

use anyhow::Result;
use async_trait::async_trait;
use shared::protocol::SearchHistoryEntry;
use storage::Storage;

use crate::{DurableStore, SearchHistoryStore};

#[async_trait]
impl SearchHistoryStore for Storage {
    async fn add(&self, entry: SearchHistoryEntry) -> Result<()> {
        self.record_search(&entry).await
    }
}

#[async_trait]
impl DurableStore for Storage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_value(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.put_value(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.delete_value(key).await?;
        Ok(())
    }
}
