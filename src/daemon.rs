//! Daemon - the always-on assistant
//!
//! Wires capture, recognition, dispatch, speech output, timers and the
//! reminder poller together and runs them until interrupted.

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::assistant::{CaptureLoop, Recognizer};
use crate::db::{self, DbPool, ReminderStore, SqliteReminderStore};
use crate::dispatch::{Collaborators, DispatchSettings, Dispatcher};
use crate::integrations::{OllamaClient, SystemLauncher, WttrClient};
use crate::pool::{PoolHandle, WorkerPool};
use crate::schedule::{ReminderPoller, TimerRegistry};
use crate::voice::{
    CommandSynthesizer, Microphone, Speaker, SpeechOutput, WakeWordDetector, WhisperStt,
};
use crate::{Config, Error, Result};

/// The Jarvis daemon
pub struct Daemon {
    config: Config,
    db: DbPool,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if the reminder database cannot be opened
    pub fn new(config: Config) -> Result<Self> {
        let db = db::init(&config.reminders.db_path)?;
        tracing::info!(path = %config.reminders.db_path.display(), "database initialized");
        Ok(Self { config, db })
    }

    /// Reminder store over this daemon's database
    #[must_use]
    pub fn reminder_store(&self) -> Arc<dyn ReminderStore> {
        Arc::new(SqliteReminderStore::new(self.db.clone()))
    }

    /// Speech output driven by the configured synthesis program
    ///
    /// # Errors
    ///
    /// Returns error if called outside a tokio runtime
    pub fn speech_output(&self) -> Result<Arc<SpeechOutput>> {
        let synth = Arc::new(CommandSynthesizer::new(&self.config.voice));
        Ok(Arc::new(SpeechOutput::new(synth)?))
    }

    /// Build a dispatcher over the concrete collaborators
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be built
    pub fn dispatcher(&self, speaker: Arc<dyn Speaker>, timers: TimerRegistry) -> Result<Dispatcher> {
        let collaborators = Collaborators {
            speaker,
            weather: Arc::new(WttrClient::new(&self.config.weather)?),
            completion: Arc::new(OllamaClient::new(&self.config.ai)?),
            launcher: Arc::new(SystemLauncher::new()),
            reminders: self.reminder_store(),
        };

        Ok(Dispatcher::new(
            collaborators,
            timers,
            DispatchSettings::from_config(&self.config),
        ))
    }

    /// Run until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if startup fails, including the initial microphone
    /// calibration. Nothing after startup is fatal.
    pub async fn run(self) -> Result<()> {
        let cancel = CancellationToken::new();

        let speech = self.speech_output()?;
        let speaker: Arc<dyn Speaker> = speech.clone();
        let timers = TimerRegistry::new(Arc::clone(&speaker));
        let dispatcher = Arc::new(self.dispatcher(Arc::clone(&speaker), timers.clone())?);

        let pool = WorkerPool::new(self.config.pool.workers, self.config.pool.queue_capacity);
        let recognizer = Arc::new(Recognizer::new(
            Arc::new(WhisperStt::new(&self.config.stt)?),
            WakeWordDetector::new(self.config.assistant.wake_words.clone())?,
            Arc::clone(&speaker),
            dispatcher,
            pool.handle(),
        ));

        let capture = self.start_capture(recognizer, pool.handle(), cancel.clone()).await?;

        let poller = ReminderPoller::new(self.reminder_store(), speaker, &self.config.reminders);
        let poller_task = tokio::spawn(poller.run(cancel.clone()));

        tracing::info!(
            name = %self.config.assistant.name,
            workers = self.config.pool.workers,
            wake_words = ?self.config.assistant.wake_words,
            "jarvis ready"
        );

        shutdown_signal().await;
        tracing::info!("shutdown requested");

        cancel.cancel();
        speech.stop().await;
        timers.shutdown();

        if let Err(e) = poller_task.await {
            tracing::warn!(error = %e, "reminder poller exited abnormally");
        }
        match tokio::task::spawn_blocking(move || capture.join()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => tracing::warn!("capture thread panicked"),
            Err(e) => tracing::warn!(error = %e, "failed to join capture thread"),
        }
        pool.shutdown().await;

        tracing::info!("daemon stopped");
        Ok(())
    }

    /// Start the capture thread and wait for its microphone check
    async fn start_capture(
        &self,
        recognizer: Arc<Recognizer>,
        pool: PoolHandle,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        let config = self.config.capture.clone();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

        // cpal streams are not Send, so the microphone lives on this thread
        let handle = std::thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                let mut capture = match Microphone::open(&config) {
                    Ok(mic) => CaptureLoop::new(mic, config, cancel),
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = capture.calibrate() {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                capture.run(|utterance| {
                    let recognizer = Arc::clone(&recognizer);
                    let job = async move {
                        recognizer.handle_utterance(utterance).await;
                    };
                    if let Err(e) = pool.try_submit(job) {
                        tracing::warn!(error = %e, "utterance dropped");
                    }
                });
            })?;

        match ready_rx.await {
            Ok(Ok(())) => {
                tracing::info!("microphone ready");
                Ok(handle)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Audio("capture thread exited during startup".to_string())),
        }
    }
}

/// Resolve on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
