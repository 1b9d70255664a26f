use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::recognizer::RecognitionEvent;
use super::recognizer::RecognitionOptions;
use super::recognizer::RecognizerFactory;
use super::recognizer::SpeechRecognizer;
use super::synthesizer::SpeechOutput;
use super::VoiceError;
use crate::interpreter::Command;
use crate::interpreter::CommandInterpreter;
use crate::interpreter::Match;

/// Transcript shown before anything has been heard
pub const INITIAL_TRANSCRIPT: &str = "Say a command...";

/// Capacity of the control channel into the adapter task
const CONTROL_CHANNEL_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListeningState {
    Idle,
    Listening,
}

/// What the dashboard shows about voice input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceStatus {
    pub listening: bool,

    /// Last normalized transcript
    pub transcript: String,
}

impl Default for VoiceStatus {
    fn default() -> Self {
        Self {
            listening: false,
            transcript: INITIAL_TRANSCRIPT.to_string(),
        }
    }
}

/// Result of interpreting one final transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptOutcome {
    pub transcript: String,
    pub matches: Vec<Match>,

    /// The phrase that was spoken, if any
    pub feedback: Option<String>,
}

enum VoiceControl {
    Start {
        reply: oneshot::Sender<Result<(), VoiceError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Transcript {
        text: String,
        reply: oneshot::Sender<TranscriptOutcome>,
    },
}

/// What woke the adapter task up
enum Wake {
    Control(Option<VoiceControl>),
    Recognition(Option<RecognitionEvent>),
}

/// Bridges a speech recognition session to the command interpreter, and
/// confirmation phrases to speech output.
///
/// The recognition session is created on the first [`VoiceAdapter::start`]
/// and reused for every later start/stop cycle.
pub struct VoiceAdapter {
    state: ListeningState,
    session: Option<Box<dyn SpeechRecognizer>>,
    factory: RecognizerFactory,
    options: RecognitionOptions,
    interpreter: CommandInterpreter,
    output: SpeechOutput,
    status: watch::Sender<VoiceStatus>,
}

impl VoiceAdapter {
    pub fn new(
        factory: RecognizerFactory,
        options: RecognitionOptions,
        interpreter: CommandInterpreter,
        output: SpeechOutput,
    ) -> Self {
        let (status, _) = watch::channel(VoiceStatus::default());
        Self {
            state: ListeningState::Idle,
            session: None,
            factory,
            options,
            interpreter,
            output,
            status,
        }
    }

    pub fn state(&self) -> ListeningState {
        self.state
    }

    pub fn status(&self) -> VoiceStatus {
        self.status.borrow().clone()
    }

    /// Begin listening. A no-op while already listening.
    pub fn start(&mut self) -> Result<(), VoiceError> {
        if self.state == ListeningState::Listening {
            debug!("Already listening");
            return Ok(());
        }

        if self.session.is_none() {
            info!(
                "Creating recognition session (language: {}, continuous: {}, interim: {})",
                self.options.language, self.options.continuous, self.options.interim_results
            );
            self.session = Some((self.factory)(&self.options)?);
        }

        if let Some(session) = &mut self.session {
            session.start()?;
        }
        self.set_state(ListeningState::Listening);
        info!("Listening for voice commands");
        Ok(())
    }

    /// Stop listening. A no-op while idle.
    pub fn stop(&mut self) {
        if self.state == ListeningState::Idle {
            return;
        }

        if let Some(session) = &mut self.session {
            session.stop();
        }
        self.set_state(ListeningState::Idle);
        info!("Stopped listening");
    }

    /// Handle one recognition event.
    ///
    /// Interim results are ignored. Errors are logged and otherwise swallowed;
    /// the listening state is left as it was.
    pub async fn handle_event(&mut self, event: RecognitionEvent) -> Option<TranscriptOutcome> {
        match event {
            RecognitionEvent::Result {
                transcript,
                is_final: true,
            } => Some(self.handle_transcript(&transcript).await),
            RecognitionEvent::Result {
                transcript,
                is_final: false,
            } => {
                debug!("Ignoring interim result: {:?}", transcript);
                None
            }
            RecognitionEvent::Error(e) => {
                error!("Speech error: {}", e);
                None
            }
        }
    }

    /// Interpret a final transcript and speak the confirmation, if any.
    pub async fn handle_transcript(&mut self, transcript: &str) -> TranscriptOutcome {
        let command = Command::new(transcript);
        info!("Command: {}", command);

        self.status
            .send_modify(|status| status.transcript = command.to_string());

        let handled = self.interpreter.handle(&command);
        let feedback = handled.feedback();
        if let Some(phrase) = &feedback {
            self.output.speak(phrase).await;
        }

        TranscriptOutcome {
            transcript: command.to_string(),
            matches: handled.interpretation.matches,
            feedback,
        }
    }

    /// Run the adapter on its own task.
    pub fn spawn(self) -> (VoiceHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CONTROL_CHANNEL_SIZE);
        let handle = VoiceHandle {
            tx,
            status: self.status.subscribe(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(mut self, mut control: mpsc::Receiver<VoiceControl>) {
        loop {
            let wake = match (&self.state, self.session.as_mut()) {
                (ListeningState::Listening, Some(session)) => {
                    tokio::select! {
                        msg = control.recv() => Wake::Control(msg),
                        event = session.next_event() => Wake::Recognition(event),
                    }
                }
                _ => Wake::Control(control.recv().await),
            };

            match wake {
                Wake::Control(None) => break,
                Wake::Control(Some(msg)) => self.handle_control(msg).await,
                Wake::Recognition(Some(event)) => {
                    self.handle_event(event).await;
                }
                Wake::Recognition(None) => {
                    info!("Recognition session ended");
                    self.stop();
                }
            }
        }

        self.stop();
        debug!("Voice adapter task exiting");
    }

    async fn handle_control(&mut self, msg: VoiceControl) {
        // A dropped reply receiver only means the caller stopped waiting
        match msg {
            VoiceControl::Start { reply } => {
                let _ = reply.send(self.start());
            }
            VoiceControl::Stop { reply } => {
                self.stop();
                let _ = reply.send(());
            }
            VoiceControl::Transcript { text, reply } => {
                let outcome = self.handle_transcript(&text).await;
                let _ = reply.send(outcome);
            }
        }
    }

    fn set_state(&mut self, state: ListeningState) {
        self.state = state;
        self.status
            .send_modify(|status| status.listening = state == ListeningState::Listening);
    }
}

/// Cloneable handle to a spawned [`VoiceAdapter`].
#[derive(Clone)]
pub struct VoiceHandle {
    tx: mpsc::Sender<VoiceControl>,
    status: watch::Receiver<VoiceStatus>,
}

impl VoiceHandle {
    pub async fn start(&self) -> Result<(), VoiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(VoiceControl::Start { reply }).await?;
        rx.await.map_err(|_| VoiceError::AdapterClosed)?
    }

    pub async fn stop(&self) -> Result<(), VoiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(VoiceControl::Stop { reply }).await?;
        rx.await.map_err(|_| VoiceError::AdapterClosed)
    }

    /// Feed a final transcript recognized elsewhere, e.g. by a browser.
    pub async fn submit(&self, text: &str) -> Result<TranscriptOutcome, VoiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(VoiceControl::Transcript {
            text: text.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| VoiceError::AdapterClosed)
    }

    pub fn status(&self) -> VoiceStatus {
        self.status.borrow().clone()
    }

    async fn send(&self, msg: VoiceControl) -> Result<(), VoiceError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| VoiceError::AdapterClosed)
    }
}
