pub mod api;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod interpreter;
pub mod remote;
pub mod view;
pub mod voice;

pub use catalog::Catalog;
pub use catalog::Category;
pub use catalog::Device;
pub use catalog::RoomFilter;
pub use config::Config;
pub use config::LogLevel;
pub use engine::ChangeSource;
pub use engine::DeviceStateStore;
pub use engine::Event;
pub use interpreter::Command;
pub use interpreter::CommandInterpreter;
pub use view::Dashboard;
pub use voice::VoiceAdapter;
pub use voice::VoiceHandle;
