//! Speech-to-text capability.

use async_trait::async_trait;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::Lines;

use super::VoiceError;
use crate::config::VoiceConfig;

/// Options a recognition session is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// Keep the session open across utterances
    pub continuous: bool,

    /// Deliver partial results as well as final ones
    pub interim_results: bool,

    /// BCP 47 language tag
    pub language: String,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: false,
            language: "en-IN".to_string(),
        }
    }
}

impl From<&VoiceConfig> for RecognitionOptions {
    fn from(config: &VoiceConfig) -> Self {
        Self {
            continuous: config.continuous,
            interim_results: config.interim_results,
            language: config.language.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Result { transcript: String, is_final: bool },
    Error(String),
}

/// A speech recognition session.
#[async_trait]
pub trait SpeechRecognizer: Send {
    fn start(&mut self) -> Result<(), VoiceError>;

    fn stop(&mut self);

    /// Next event from the session. `None` once the session can produce no
    /// more events. Must be cancel-safe.
    async fn next_event(&mut self) -> Option<RecognitionEvent>;
}

/// Creates the recognition session the first time listening starts.
pub type RecognizerFactory =
    Box<dyn FnMut(&RecognitionOptions) -> Result<Box<dyn SpeechRecognizer>, VoiceError> + Send>;

/// Treats every non-blank line of a text stream as a final transcript.
///
/// Stands in for a microphone when transcripts come from a terminal or a
/// pipe from an external recognizer.
pub struct LineRecognizer<R> {
    lines: Lines<R>,
    active: bool,
}

impl<R: AsyncBufRead + Unpin + Send> LineRecognizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            active: false,
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> SpeechRecognizer for LineRecognizer<R> {
    fn start(&mut self) -> Result<(), VoiceError> {
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    async fn next_event(&mut self) -> Option<RecognitionEvent> {
        if !self.active {
            return None;
        }

        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    return Some(RecognitionEvent::Result {
                        transcript: line,
                        is_final: true,
                    })
                }
                Ok(None) => return None,
                Err(e) => return Some(RecognitionEvent::Error(e.to_string())),
            }
        }
    }
}
