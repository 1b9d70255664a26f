use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::event::ChangeSource;
use super::event::Event;
use super::state::DeviceStates;
use crate::catalog::Catalog;
use crate::remote::device_path;
use crate::remote::RemoteError;
use crate::remote::RemoteStore;

/// Capacity of the state-change broadcast channel. Slow subscribers lag
/// rather than block writers.
const EVENT_CHANNEL_SIZE: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    #[error("remote store '{0}' cannot be read")]
    ReadUnsupported(String),

    #[error("failed to read '{device_id}' from the remote store: {reason}")]
    RemoteRead { device_id: String, reason: String },
}

/// A remote write in flight.
///
/// Dropping it leaves the write queued; failures are logged either way.
#[derive(Debug)]
pub struct PendingWrite {
    device_id: String,
    value: bool,
    result: oneshot::Receiver<Result<(), RemoteError>>,
}

impl PendingWrite {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The value that was applied locally and sent to the remote store
    pub fn value(&self) -> bool {
        self.value
    }

    /// Wait for the remote store to acknowledge (or reject) the write.
    pub async fn outcome(self) -> Result<(), RemoteError> {
        match self.result.await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Task("remote writer stopped".to_string())),
        }
    }
}

struct RemoteWrite {
    path: String,
    value: bool,
    reply: oneshot::Sender<Result<(), RemoteError>>,
}

/// Apply remote writes one at a time, in the order they were queued.
async fn run_writer(remote: Arc<dyn RemoteStore>, mut queue: mpsc::UnboundedReceiver<RemoteWrite>) {
    while let Some(write) = queue.recv().await {
        let result = remote.write(&write.path, write.value).await;
        match &result {
            Ok(()) => debug!("Remote write {} = {} acknowledged", write.path, write.value),
            Err(e) => warn!("Remote write {} = {} failed: {}", write.path, write.value, e),
        }
        // The caller may have dropped its PendingWrite
        let _ = write.reply.send(result);
    }
    debug!("Remote writer exiting");
}

/// Source of truth for device on/off state.
///
/// Writes are optimistic: the local snapshot changes immediately and the
/// remote write is queued to a single writer task, so the remote store sees
/// writes in call order. Nothing is rolled back if a remote write fails.
pub struct DeviceStateStore {
    catalog: Arc<Catalog>,

    /// Current snapshot (readers load the Arc, writers store a new one)
    state: ArcSwap<DeviceStates>,

    /// Serializes writers so toggles read-modify-write atomically
    write_lock: Mutex<()>,

    /// Used directly for reads; writes go through `writes`
    remote: Arc<dyn RemoteStore>,

    writes: mpsc::UnboundedSender<RemoteWrite>,

    events: broadcast::Sender<Event>,
}

impl DeviceStateStore {
    /// Spawns the remote writer, so must be called from within a tokio
    /// runtime. The writer exits once the store is dropped and its queue
    /// is drained.
    pub fn new(catalog: Arc<Catalog>, remote: Arc<dyn RemoteStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (writes, queue) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(remote.clone(), queue));
        Self {
            state: ArcSwap::from_pointee(DeviceStates::for_catalog(&catalog)),
            catalog,
            write_lock: Mutex::new(()),
            remote,
            writes,
            events,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Get a snapshot of the current state.
    pub fn snapshot(&self) -> Arc<DeviceStates> {
        self.state.load_full()
    }

    pub fn get(&self, device_id: &str) -> Result<bool, StoreError> {
        self.state
            .load()
            .get(device_id)
            .ok_or_else(|| StoreError::UnknownDevice(device_id.to_string()))
    }

    /// Receive a [`Event::DeviceStateChanged`] for every applied change.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Queue a remote write of `value` and apply it locally.
    pub fn set_state(
        &self,
        device_id: &str,
        value: bool,
        source: ChangeSource,
    ) -> Result<PendingWrite, StoreError> {
        let guard = self.lock_writes();
        self.set_locked(&guard, device_id, value, source)
    }

    /// Flip a device. Returns the write for the new value.
    pub fn toggle(
        &self,
        device_id: &str,
        source: ChangeSource,
    ) -> Result<PendingWrite, StoreError> {
        let guard = self.lock_writes();
        let current = self.get(device_id)?;
        self.set_locked(&guard, device_id, !current, source)
    }

    /// Replace local defaults with whatever the remote store holds.
    ///
    /// Returns the number of devices that had a remote value.
    pub async fn hydrate(&self) -> usize {
        if !self.remote.supports_read() {
            info!(
                "Remote store '{}' cannot be read, starting with all devices off",
                self.remote.name()
            );
            return 0;
        }

        let mut loaded = 0;
        for device in self.catalog.iter() {
            match self.load(&device.id).await {
                Ok(Some(_)) => loaded += 1,
                Ok(None) => {}
                Err(e) => warn!("{}", e),
            }
        }

        info!("Loaded {} device states from remote store", loaded);
        loaded
    }

    /// Replace one device's local value with the remote one.
    ///
    /// Returns the remote value; `None` leaves the local value as it was.
    pub async fn load(&self, device_id: &str) -> Result<Option<bool>, StoreError> {
        if !self.catalog.contains(device_id) {
            return Err(StoreError::UnknownDevice(device_id.to_string()));
        }
        if !self.remote.supports_read() {
            return Err(StoreError::ReadUnsupported(self.remote.name().to_string()));
        }

        let value = self
            .remote
            .read(&device_path(device_id))
            .await
            .map_err(|e| StoreError::RemoteRead {
                device_id: device_id.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(on) = value {
            let _guard = self.lock_writes();
            self.apply(device_id, on, ChangeSource::Remote);
        }
        Ok(value)
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_locked(
        &self,
        _guard: &MutexGuard<'_, ()>,
        device_id: &str,
        value: bool,
        source: ChangeSource,
    ) -> Result<PendingWrite, StoreError> {
        if !self.catalog.contains(device_id) {
            return Err(StoreError::UnknownDevice(device_id.to_string()));
        }

        // Queued under the write lock, so queue order is call order
        let (reply, result) = oneshot::channel();
        let write = RemoteWrite {
            path: device_path(device_id),
            value,
            reply,
        };
        if self.writes.send(write).is_err() {
            warn!("Remote writer is gone, {} = {} will not be persisted", device_id, value);
        }

        self.apply(device_id, value, source);

        Ok(PendingWrite {
            device_id: device_id.to_string(),
            value,
            result,
        })
    }

    /// Store a new snapshot and notify subscribers. Callers hold the write lock.
    fn apply(&self, device_id: &str, on: bool, source: ChangeSource) {
        let mut state = DeviceStates::clone(&self.state.load());
        state.set(device_id, on);
        self.state.store(Arc::new(state));

        info!("Device state changed: {} -> on={} ({})", device_id, on, source);

        // No subscribers is fine
        let _ = self.events.send(Event::DeviceStateChanged {
            device_id: device_id.to_string(),
            on,
            source,
        });
    }
}
