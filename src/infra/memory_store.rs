use crate::app::ports::{InstanceStorePort, StoreError};
use crate::error::{Result, StartupError};
use crate::types::ServiceInstanceRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// In-memory instance store for development and testing
#[derive(Clone, Default)]
pub struct MemoryInstanceStore {
    records: Arc<RwLock<HashMap<String, ServiceInstanceRecord>>>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = ServiceInstanceRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.instance_id.clone(), r))
            .collect();
        Self {
            records: Arc::new(RwLock::new(map)),
        }
    }

    /// Loads a JSON array of service instance records
    pub fn from_seed_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StartupError::Config(format!("Failed to read seed file '{}': {}", path.display(), e))
        })?;
        let records: Vec<ServiceInstanceRecord> = serde_json::from_str(&content)?;
        debug!("Seeded {} service instances from {}", records.len(), path.display());
        Ok(Self::with_records(records))
    }

    pub fn insert(&self, record: ServiceInstanceRecord) {
        if let Ok(mut records) = self.records.write() {
            records.insert(record.instance_id.clone(), record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InstanceStorePort for MemoryInstanceStore {
    async fn get(&self, instance_id: &str) -> std::result::Result<ServiceInstanceRecord, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|e| StoreError::Backend(format!("instance store lock poisoned: {}", e)))?;
        records.get(instance_id).cloned().ok_or(StoreError::NotFound)
    }
}
