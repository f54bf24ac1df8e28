use super::{DedupRecord, DedupStore};
use crate::error::DedupError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-process dedup store for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryDedupStore {
    records: Arc<Mutex<HashMap<String, DedupRecord>>>,
}

impl InMemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    pub async fn get(&self, key: &str) -> Option<DedupRecord> {
        self.records.lock().await.get(key).cloned()
    }
}

#[async_trait]
impl DedupStore for InMemoryDedupStore {
    async fn exists(&self, key: &str) -> Result<bool, DedupError> {
        Ok(self.records.lock().await.contains_key(key))
    }

    async fn insert(&self, record: &DedupRecord) -> Result<(), DedupError> {
        self.insert_if_absent(record).await.map(|_| ())
    }

    async fn insert_if_absent(&self, record: &DedupRecord) -> Result<bool, DedupError> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.key) {
            return Ok(false);
        }
        records.insert(record.key.clone(), record.clone());
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
