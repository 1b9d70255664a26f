//! Voice command interpretation.
//!
//! Commands are matched by plain substring containment against fixed English
//! and Hindi templates built from each device name. There is no grammar and
//! no word-boundary check.
//!
//! The whole catalog is always scanned: every device whose templates appear
//! in the command is switched, and only the last match's confirmation phrase
//! is kept. "turn on kitchen light and turn off bedroom fan" switches both
//! devices and confirms only the bedroom fan.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::catalog::Catalog;
use crate::catalog::Device;
use crate::engine::ChangeSource;
use crate::engine::DeviceStateStore;
use crate::engine::PendingWrite;

const ENGLISH_ON: &[&str] = &["turn on", "switch on"];
const ENGLISH_OFF: &[&str] = &["turn off", "switch off"];
const HINDI_ON: &[&str] = &["chalu karo", "on karo", "चालू करो"];
const HINDI_OFF: &[&str] = &["band karo", "off karo", "बंद करो"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    On,
    Off,
}

impl Action {
    pub fn is_on(self) -> bool {
        self == Action::On
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    English,
    Hindi,
}

/// A normalized transcript: trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command(String);

impl Command {
    pub fn new(transcript: &str) -> Self {
        Self(transcript.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One device matched by a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    pub device_id: String,
    pub device_name: String,
    pub action: Action,
    pub language: Language,
}

impl Match {
    /// Spoken confirmation, in the language the command was given in.
    pub fn feedback(&self) -> String {
        match (self.language, self.action) {
            (Language::English, Action::On) => format!("{} turned on", self.device_name),
            (Language::English, Action::Off) => format!("{} turned off", self.device_name),
            (Language::Hindi, Action::On) => format!("{} चालू हो गया", self.device_name),
            (Language::Hindi, Action::Off) => format!("{} बंद हो गया", self.device_name),
        }
    }
}

/// Every device a command matched, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Interpretation {
    pub matches: Vec<Match>,
}

impl Interpretation {
    /// Confirmation of the last match; earlier ones are overwritten.
    pub fn feedback(&self) -> Option<String> {
        self.matches.last().map(Match::feedback)
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

fn contains_any(command: &str, phrases: impl IntoIterator<Item = String>) -> bool {
    phrases.into_iter().any(|p| command.contains(&p))
}

/// Match a single device. English templates take precedence; Hindi ones are
/// only tried when no English template matched this device.
fn match_device(command: &str, device: &Device) -> Option<(Action, Language)> {
    let name = device.name.to_lowercase();
    let english = |verbs: &[&str]| contains_any(command, verbs.iter().map(|v| format!("{} {}", v, name)));
    let hindi = |suffixes: &[&str]| {
        contains_any(command, suffixes.iter().map(|s| format!("{} {}", name, s)))
    };

    if english(ENGLISH_ON) {
        Some((Action::On, Language::English))
    } else if english(ENGLISH_OFF) {
        Some((Action::Off, Language::English))
    } else if hindi(HINDI_ON) {
        Some((Action::On, Language::Hindi))
    } else if hindi(HINDI_OFF) {
        Some((Action::Off, Language::Hindi))
    } else {
        None
    }
}

/// Resolve a command against the catalog without touching any state.
pub fn interpret(command: &Command, catalog: &Catalog) -> Interpretation {
    if command.is_empty() {
        return Interpretation::default();
    }

    let matches = catalog
        .iter()
        .filter_map(|device| {
            match_device(command.as_str(), device).map(|(action, language)| Match {
                device_id: device.id.clone(),
                device_name: device.name.clone(),
                action,
                language,
            })
        })
        .collect();

    Interpretation { matches }
}

/// Result of applying a command to the store.
#[derive(Debug)]
pub struct HandledCommand {
    pub interpretation: Interpretation,

    /// Remote writes issued for the matches, in match order
    pub writes: Vec<PendingWrite>,
}

impl HandledCommand {
    pub fn feedback(&self) -> Option<String> {
        self.interpretation.feedback()
    }
}

/// Applies interpreted commands to a [`DeviceStateStore`].
#[derive(Clone)]
pub struct CommandInterpreter {
    store: Arc<DeviceStateStore>,
}

impl CommandInterpreter {
    pub fn new(store: Arc<DeviceStateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<DeviceStateStore> {
        &self.store
    }

    /// Interpret `command` and switch every matched device.
    pub fn handle(&self, command: &Command) -> HandledCommand {
        let interpretation = interpret(command, self.store.catalog());
        if interpretation.is_empty() {
            debug!("No device matched command: {:?}", command.as_str());
        }

        let writes = interpretation
            .matches
            .iter()
            .filter_map(|m| {
                match self
                    .store
                    .set_state(&m.device_id, m.action.is_on(), ChangeSource::Voice)
                {
                    Ok(write) => Some(write),
                    Err(e) => {
                        warn!("Failed to apply voice command to {}: {}", m.device_id, e);
                        None
                    }
                }
            })
            .collect();

        HandledCommand {
            interpretation,
            writes,
        }
    }
}
