//! Remote persistence for device state.
//!
//! The remote store is an opaque path-keyed boolean store. Every device lives
//! at `/devices/<id>`. Backends register a factory in [`REGISTRY`]; the first
//! one that finds its configuration wins, otherwise state is kept in memory.

#[cfg(feature = "store_firebase")]
mod firebase;
mod memory;
#[cfg(feature = "store_mqtt")]
mod mqtt;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use linkme::distributed_slice;
use tracing::info;
use tracing::warn;

use crate::config::Config;
#[cfg(feature = "store_firebase")]
pub use firebase::FirebaseStore;
pub use memory::MemoryStore;
#[cfg(feature = "store_mqtt")]
pub use mqtt::MqttStore;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request to remote store failed: {0}")]
    Request(String),

    #[error("remote store rejected {path} with status {status}: {body}")]
    Rejected {
        path: String,
        status: u16,
        body: String,
    },

    #[error("unexpected value at {path}: {value}")]
    UnexpectedValue { path: String, value: String },

    #[error("remote write task failed: {0}")]
    Task(String),
}

/// Path of a device's state in the remote store
pub fn device_path(device_id: &str) -> String {
    format!("/devices/{}", device_id)
}

/// A path-keyed boolean persistence capability
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Write `value` at `path`
    async fn write(&self, path: &str, value: bool) -> Result<(), RemoteError>;

    /// Read the value at `path`. `None` means nothing is stored there, or the
    /// backend cannot read (see [`RemoteStore::supports_read`]).
    async fn read(&self, _path: &str) -> Result<Option<bool>, RemoteError> {
        Ok(None)
    }

    fn supports_read(&self) -> bool {
        false
    }
}

/// Result type for remote store factory functions
pub type RemoteStoreFactoryResult = anyhow::Result<Option<Arc<dyn RemoteStore>>>;

pub struct RemoteStoreContext<'a> {
    pub config: &'a Config,
}

#[distributed_slice]
pub static REGISTRY: [fn(&RemoteStoreContext) -> RemoteStoreFactoryResult];

/// Pick the configured remote store, falling back to [`MemoryStore`] only
/// when no backend is configured. A configured backend that fails to set up
/// is an error.
pub fn from_config(config: &Config) -> anyhow::Result<Arc<dyn RemoteStore>> {
    let ctx = RemoteStoreContext { config };
    for constr in REGISTRY {
        if let Some(store) = constr(&ctx).context("failed to set up remote store")? {
            info!("Using remote store: {}", store.name());
            return Ok(store);
        }
    }

    warn!("No remote store configured, device state will not be persisted");
    Ok(Arc::new(MemoryStore::new()))
}
