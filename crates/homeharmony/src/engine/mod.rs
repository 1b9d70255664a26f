mod event;
mod state;
mod store;

pub use event::ChangeSource;
pub use event::Event;
pub use state::DeviceStates;
pub use store::DeviceStateStore;
pub use store::PendingWrite;
pub use store::StoreError;
