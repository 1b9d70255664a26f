use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::RemoteError;
use super::RemoteStore;

/// In-process store. Used when no backend is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far
    pub fn values(&self) -> HashMap<String, bool> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write(&self, path: &str, value: bool) -> Result<(), RemoteError> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(path.to_string(), value);
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<bool>, RemoteError> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(path).copied())
    }

    fn supports_read(&self) -> bool {
        true
    }
}
