//! Text-to-speech capability.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use super::VoiceError;
use crate::config::VoiceConfig;

/// A synthesis voice offered by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    pub name: String,
    pub lang: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utterance {
    pub text: String,
    pub pitch: f32,
    pub rate: f32,
    pub voice: Option<Voice>,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Voices currently available, in platform order
    fn voices(&self) -> Vec<Voice>;

    /// Queue an utterance. Returns once it is handed to the platform, not
    /// when playback finishes.
    async fn speak(&self, utterance: Utterance) -> Result<(), VoiceError>;
}

/// First voice whose language tag equals `preferred_lang`, else the first
/// voice at all.
pub fn select_voice(voices: &[Voice], preferred_lang: &str) -> Option<Voice> {
    voices
        .iter()
        .find(|v| v.lang == preferred_lang)
        .or_else(|| voices.first())
        .cloned()
}

/// Speaks confirmation phrases with fixed pitch, rate and voice preference.
#[derive(Clone)]
pub struct SpeechOutput {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    preferred_lang: String,
    pitch: f32,
    rate: f32,
}

impl SpeechOutput {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, config: &VoiceConfig) -> Self {
        Self {
            synthesizer,
            preferred_lang: config.preferred_voice_lang.clone(),
            pitch: config.pitch,
            rate: config.rate,
        }
    }

    pub fn utterance(&self, text: &str) -> Utterance {
        Utterance {
            text: text.to_string(),
            pitch: self.pitch,
            rate: self.rate,
            voice: select_voice(&self.synthesizer.voices(), &self.preferred_lang),
        }
    }

    /// Speak `text`. Failures are logged, never returned.
    pub async fn speak(&self, text: &str) {
        if let Err(e) = self.synthesizer.speak(self.utterance(text)).await {
            warn!("Speech synthesis failed: {}", e);
        }
    }
}

/// Prints phrases to stdout instead of playing audio.
#[derive(Debug, Default)]
pub struct ConsoleSynthesizer;

#[async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        vec![Voice {
            name: "console".to_string(),
            lang: "en-IN".to_string(),
        }]
    }

    async fn speak(&self, utterance: Utterance) -> Result<(), VoiceError> {
        info!(
            voice = ?utterance.voice.as_ref().map(|v| &v.name),
            pitch = utterance.pitch,
            rate = utterance.rate,
            "Speaking: {}",
            utterance.text
        );
        println!("🔊 {}", utterance.text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, lang: &str) -> Voice {
        Voice {
            name: name.to_string(),
            lang: lang.to_string(),
        }
    }

    #[test]
    fn test_select_preferred_language() {
        let voices = vec![voice("alex", "en-US"), voice("veena", "en-IN")];
        assert_eq!(select_voice(&voices, "en-IN"), Some(voice("veena", "en-IN")));
    }

    #[test]
    fn test_select_falls_back_to_first() {
        let voices = vec![voice("alex", "en-US"), voice("anna", "de-DE")];
        assert_eq!(select_voice(&voices, "en-IN"), Some(voice("alex", "en-US")));
        assert_eq!(select_voice(&[], "en-IN"), None);
    }

    #[test]
    fn test_utterance_parameters() {
        let output = SpeechOutput::new(Arc::new(ConsoleSynthesizer), &VoiceConfig::default());
        let utterance = output.utterance("kitchen light turned on");
        assert_eq!(utterance.pitch, 1.5);
        assert_eq!(utterance.rate, 1.0);
        assert_eq!(utterance.voice, Some(voice("console", "en-IN")));
    }
}
