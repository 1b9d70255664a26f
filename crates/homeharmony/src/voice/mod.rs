//! Voice I/O
//!
//! Speech recognition and synthesis are external capabilities behind the
//! [`SpeechRecognizer`] and [`SpeechSynthesizer`] traits. The
//! [`VoiceAdapter`] owns the recognition session and feeds final transcripts
//! to the command interpreter.

mod adapter;
mod recognizer;
mod synthesizer;

pub use adapter::ListeningState;
pub use adapter::TranscriptOutcome;
pub use adapter::VoiceAdapter;
pub use adapter::VoiceHandle;
pub use adapter::VoiceStatus;
pub use adapter::INITIAL_TRANSCRIPT;
pub use recognizer::LineRecognizer;
pub use recognizer::RecognitionEvent;
pub use recognizer::RecognitionOptions;
pub use recognizer::RecognizerFactory;
pub use recognizer::SpeechRecognizer;
pub use synthesizer::select_voice;
pub use synthesizer::ConsoleSynthesizer;
pub use synthesizer::SpeechOutput;
pub use synthesizer::SpeechSynthesizer;
pub use synthesizer::Utterance;
pub use synthesizer::Voice;

#[cfg(test)]
pub(crate) use adapter::tests as tests_support;

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("speech recognition unavailable: {0}")]
    RecognitionUnavailable(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("voice adapter is not running")]
    AdapterClosed,
}
