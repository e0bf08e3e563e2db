//! Recognition task: speech-to-text, wake detection and acknowledgement

use std::sync::Arc;

use crate::Error;
use crate::dispatch::Dispatcher;
use crate::pool::PoolHandle;
use crate::voice::{Speaker, SpeechToText, Utterance, WakeWordDetector};

/// Transcripts shorter than this are treated as noise
const MIN_TRANSCRIPT_CHARS: usize = 2;

/// Spoken instead of the acknowledgement when the queue is full
const BUSY_REPLY: &str = "Busy, try again shortly";

/// What became of one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heard {
    /// Nothing intelligible, or recognition failed
    Nothing,
    /// Speech without a wake word
    NoWakeWord,
    /// The wake word on its own
    WakeOnly,
    /// A command was handed to the pool
    Command(String),
    /// A command was heard but the pool rejected it
    Dropped(String),
}

/// Turns utterances into dispatched commands
pub struct Recognizer {
    stt: Arc<dyn SpeechToText>,
    wake: WakeWordDetector,
    speaker: Arc<dyn Speaker>,
    dispatcher: Arc<Dispatcher>,
    pool: PoolHandle,
}

impl Recognizer {
    #[must_use]
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        wake: WakeWordDetector,
        speaker: Arc<dyn Speaker>,
        dispatcher: Arc<Dispatcher>,
        pool: PoolHandle,
    ) -> Self {
        Self {
            stt,
            wake,
            speaker,
            dispatcher,
            pool,
        }
    }

    /// Recognize one utterance and act on it
    ///
    /// The utterance is consumed whether or not recognition succeeds.
    pub async fn handle_utterance(&self, utterance: Utterance) -> Heard {
        let transcript = match self.stt.recognize(&utterance).await {
            Ok(text) => text,
            Err(Error::NoSpeech) => {
                tracing::debug!("no speech recognized");
                return Heard::Nothing;
            }
            Err(e) => {
                tracing::warn!(error = %e, "speech recognition failed");
                return Heard::Nothing;
            }
        };
        drop(utterance);

        self.handle_transcript(&transcript)
    }

    /// Act on recognized text
    ///
    /// Speaks "Yes" for a bare wake word, or "Sure" and queues the command
    /// for dispatch. "Sure" is only said once a queue slot is held, so a
    /// rejected command is never acknowledged. Anything without a wake word
    /// is ignored silently.
    pub fn handle_transcript(&self, transcript: &str) -> Heard {
        let phrase = transcript.trim().to_lowercase();
        if phrase.chars().count() < MIN_TRANSCRIPT_CHARS {
            return Heard::Nothing;
        }
        tracing::debug!(transcript = %phrase, "transcribed");

        let Some(command) = self.wake.extract_command(&phrase) else {
            return Heard::NoWakeWord;
        };

        if command.is_empty() {
            self.speaker.speak("Yes");
            return Heard::WakeOnly;
        }

        let slot = match self.pool.try_reserve() {
            Ok(slot) => slot,
            Err(e) => {
                tracing::warn!(command = %command, error = %e, "command dropped");
                if matches!(e, Error::PoolFull) {
                    self.speaker.speak(BUSY_REPLY);
                }
                return Heard::Dropped(command);
            }
        };

        self.speaker.speak("Sure");

        let dispatcher = Arc::clone(&self.dispatcher);
        let job_command = command.clone();
        slot.submit(async move {
            dispatcher.dispatch(&job_command).await;
        });

        tracing::info!(command = %command, "command queued");
        Heard::Command(command)
    }
}
