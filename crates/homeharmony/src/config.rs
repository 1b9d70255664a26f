//! Configuration file parsing and structures.
//!
//! homeharmony uses a single TOML file. Every section is optional; a missing
//! section falls back to the built-in catalog, `en-IN` recognition and an
//! in-memory state store.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

use crate::catalog::Catalog;
use crate::catalog::CatalogError;
use crate::catalog::Device;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    pub voice: VoiceConfig,
    pub store: StoreConfig,

    /// Replaces the built-in device catalog when present
    pub devices: Option<Vec<Device>>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: LogLevel,

    /// Per-target levels, e.g. `"homeharmony::api" = "debug"`
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build the subscriber filter for this configuration.
    pub fn targets(&self) -> Targets {
        self.overrides.iter().fold(
            Targets::new().with_default(LevelFilter::from(self.level)),
            |targets, (target, level)| targets.with_target(target.clone(), LevelFilter::from(*level)),
        )
    }
}

/// HTTP API configuration
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub listen: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: "127.0.0.1".to_string(),
            port: 8565,
        }
    }
}

/// Speech capture and synthesis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,

    /// Start listening as soon as the daemon is up instead of waiting for
    /// `/v1/voice/start`
    pub listen_on_start: bool,

    /// Recognition language tag
    pub language: String,

    pub continuous: bool,

    pub interim_results: bool,

    /// Language tag used to pick the synthesis voice
    pub preferred_voice_lang: String,

    pub pitch: f32,

    pub rate: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_on_start: false,
            language: "en-IN".to_string(),
            continuous: true,
            interim_results: false,
            preferred_voice_lang: "en-IN".to_string(),
            pitch: 1.5,
            rate: 1.0,
        }
    }
}

/// Remote state store configuration
///
/// At most one backend may be configured. With none, state lives in memory.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Read every device's value from the remote store at startup
    pub hydrate_on_start: bool,

    pub firebase: Option<FirebaseConfig>,

    pub mqtt: Option<MqttConfig>,
}

/// Firebase Realtime Database backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FirebaseConfig {
    /// e.g. `https://my-project.firebaseio.com`
    pub database_url: String,

    /// Database secret or ID token, sent as the `auth` query parameter
    #[serde(default)]
    pub auth: Option<String>,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "homeharmony".to_string()
}

fn default_topic_prefix() -> String {
    "homeharmony".to_string()
}

/// MQTT backend (retained topics per device)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address
    pub broker: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Prepended to the device path, e.g. `homeharmony/devices/fan_bedroom`
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.firebase.is_some() && self.store.mqtt.is_some() {
            return Err(ConfigError::Invalid(
                "store.firebase and store.mqtt are mutually exclusive".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.voice.pitch) {
            return Err(ConfigError::Invalid(format!(
                "voice.pitch must be between 0 and 2, got {}",
                self.voice.pitch
            )));
        }

        if !(0.1..=10.0).contains(&self.voice.rate) {
            return Err(ConfigError::Invalid(format!(
                "voice.rate must be between 0.1 and 10, got {}",
                self.voice.rate
            )));
        }

        Ok(())
    }

    /// The device catalog: configured devices, or the built-in one
    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        match &self.devices {
            Some(devices) => Ok(Catalog::new(devices.clone())?),
            None => Ok(Catalog::default()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid device catalog: {0}")]
    Catalog(#[from] CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.api.enabled);
        assert_eq!(config.api.port, 8565);
        assert_eq!(config.voice.language, "en-IN");
        assert!(config.voice.continuous);
        assert!(!config.voice.interim_results);
        assert_eq!(config.voice.pitch, 1.5);
        assert_eq!(config.voice.rate, 1.0);
        assert!(config.store.firebase.is_none());
        assert_eq!(config.catalog().unwrap(), Catalog::default());
    }

    #[test]
    fn test_parse_logging_overrides() {
        let toml = r#"
            [logging]
            level = "warn"

            [logging.overrides]
            "homeharmony::voice" = "debug"
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(
            config.logging.overrides.get("homeharmony::voice"),
            Some(&LogLevel::Debug)
        );
    }

    #[test]
    fn test_parse_firebase_store() {
        let toml = r#"
            [store]
            hydrate_on_start = true

            [store.firebase]
            database_url = "https://example.firebaseio.com"
            auth = "secret"
        "#;

        let config = Config::parse(toml).unwrap();
        assert!(config.store.hydrate_on_start);
        let firebase = config.store.firebase.unwrap();
        assert_eq!(firebase.database_url, "https://example.firebaseio.com");
        assert_eq!(firebase.auth.as_deref(), Some("secret"));
    }

    #[test]
    fn test_parse_mqtt_store_defaults() {
        let toml = r#"
            [store.mqtt]
            broker = "localhost"
        "#;

        let config = Config::parse(toml).unwrap();
        let mqtt = config.store.mqtt.unwrap();
        assert_eq!(mqtt.port, 1883);
        assert_eq!(mqtt.client_id, "homeharmony");
        assert_eq!(mqtt.topic_prefix, "homeharmony");
        assert!(mqtt.username.is_none());
    }

    #[test]
    fn test_both_backends_rejected() {
        let toml = r#"
            [store.firebase]
            database_url = "https://example.firebaseio.com"

            [store.mqtt]
            broker = "localhost"
        "#;

        assert!(matches!(Config::parse(toml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_out_of_range_pitch_rejected() {
        let toml = r#"
            [voice]
            pitch = 3.0
        "#;

        assert!(matches!(Config::parse(toml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_custom_devices() {
        let toml = r#"
            [[devices]]
            id = "lamp_study"
            name = "study lamp"
            category = "light"
            room = "Study"

            [[devices]]
            id = "fan_study"
            name = "study fan"
            category = "fan"
            room = "Study"
        "#;

        let config = Config::parse(toml).unwrap();
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("fan_study").unwrap().category, Category::Fan);
        assert_eq!(catalog.rooms(), vec!["Study"]);
    }

    #[test]
    fn test_duplicate_devices_rejected() {
        let toml = r#"
            [[devices]]
            id = "lamp"
            name = "lamp"
            category = "light"
            room = "Study"

            [[devices]]
            id = "lamp"
            name = "other lamp"
            category = "light"
            room = "Study"
        "#;

        let config = Config::parse(toml).unwrap();
        assert!(matches!(config.catalog(), Err(ConfigError::Catalog(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("homeharmony.toml");
        std::fs::write(&path, "[api]\nport = 9000\nlisten = \"0.0.0.0\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.listen, "0.0.0.0");
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }
}
