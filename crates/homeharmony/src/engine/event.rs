use serde::Serialize;

/// What caused a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeSource {
    /// Explicit request: a click, the HTTP API, the CLI
    Manual,
    /// A recognized voice command
    Voice,
    /// Value loaded back from the remote store
    Remote,
}

/// Events broadcast by the state store so views can refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    DeviceStateChanged {
        device_id: String,
        on: bool,
        source: ChangeSource,
    },
}
