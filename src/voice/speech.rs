//! Speech output controller
//!
//! Every spoken response funnels through [`SpeechOutput`]. The most recent
//! call wins: a new utterance cancels the one in flight, and never starts
//! until the cancelled one has fully stopped, so audio is replaced rather
//! than mixed.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::Synthesizer;
use crate::{Error, Result};

/// Something that can say a line out loud without blocking the caller
pub trait Speaker: Send + Sync {
    /// Queue `text` for speaking, replacing anything currently spoken
    fn speak(&self, text: &str);
}

struct ActiveSpeech {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the single audio output channel
pub struct SpeechOutput {
    synth: Arc<dyn Synthesizer>,
    runtime: Handle,
    active: Mutex<Option<ActiveSpeech>>,
}

impl SpeechOutput {
    /// Create a controller bound to the current tokio runtime
    ///
    /// # Errors
    ///
    /// Returns error if called outside a tokio runtime
    pub fn new(synth: Arc<dyn Synthesizer>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Tts(format!("speech output needs a tokio runtime: {e}")))?;
        Ok(Self::with_runtime(synth, runtime))
    }

    /// Create a controller that spawns utterances on `runtime`
    #[must_use]
    pub fn with_runtime(synth: Arc<dyn Synthesizer>, runtime: Handle) -> Self {
        Self {
            synth,
            runtime,
            active: Mutex::new(None),
        }
    }

    /// Cancel the in-flight utterance and wait for it to stop
    pub async fn stop(&self) {
        let previous = self.lock().take();
        if let Some(previous) = previous {
            previous.cancel.cancel();
            if let Err(e) = previous.task.await {
                tracing::warn!(error = %e, "speech task failed");
            }
            tracing::debug!("speech stopped");
        }
    }

    /// Wait for the current utterance to play out
    pub async fn finish(&self) {
        let current = self.lock().take();
        if let Some(current) = current {
            if let Err(e) = current.task.await {
                tracing::warn!(error = %e, "speech task failed");
            }
        }
    }

    /// Whether an utterance is queued or playing
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ActiveSpeech>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Speaker for SpeechOutput {
    fn speak(&self, text: &str) {
        let text = text.to_string();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let synth = Arc::clone(&self.synth);

        let mut active = self.lock();
        let previous = active.take();
        if let Some(previous) = &previous {
            previous.cancel.cancel();
        }

        let task = self.runtime.spawn(async move {
            if let Some(previous) = previous {
                // Never overlap: the replaced utterance must be gone first
                if let Err(e) = previous.task.await {
                    tracing::warn!(error = %e, "replaced speech task failed");
                }
            }
            if token.is_cancelled() {
                tracing::trace!(text = %text, "utterance replaced before it started");
                return;
            }

            tracing::debug!(text = %text, "speaking");
            if let Err(e) = synth.say(&text, token).await {
                tracing::warn!(error = %e, "speech synthesis failed");
            }
        });

        *active = Some(ActiveSpeech { cancel, task });
    }
}
