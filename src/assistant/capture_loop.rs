//! Capture loop
//!
//! Runs on a dedicated thread, blocking on the audio source with a short
//! timeout so the stop token is checked at least once per listen window.

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::CaptureConfig;
use crate::voice::{AudioSource, Utterance};
use crate::{Error, Result};

/// Drives an [`AudioSource`] until cancelled
pub struct CaptureLoop<S> {
    source: S,
    config: CaptureConfig,
    cancel: CancellationToken,
    last_calibration: Option<Instant>,
}

impl<S: AudioSource> CaptureLoop<S> {
    #[must_use]
    pub const fn new(source: S, config: CaptureConfig, cancel: CancellationToken) -> Self {
        Self {
            source,
            config,
            cancel,
            last_calibration: None,
        }
    }

    /// Calibrate against ambient noise
    ///
    /// Called once before [`run`](Self::run) as the microphone check.
    ///
    /// # Errors
    ///
    /// Returns error if the source cannot be read
    pub fn calibrate(&mut self) -> Result<()> {
        self.source.calibrate(self.config.calibration)?;
        self.last_calibration = Some(Instant::now());
        Ok(())
    }

    /// Listen until cancelled, handing each utterance to `on_utterance`
    ///
    /// `on_utterance` must not block; it should queue the work and return.
    /// Capture faults are logged and retried after a short backoff.
    pub fn run(mut self, mut on_utterance: impl FnMut(Utterance)) -> S {
        tracing::info!("capture loop started");

        while !self.cancel.is_cancelled() {
            if self.calibration_due() {
                if let Err(e) = self.calibrate() {
                    tracing::warn!(error = %e, "recalibration failed");
                    self.backoff();
                    continue;
                }
            }

            match self
                .source
                .listen(self.config.listen_timeout, self.config.phrase_limit)
            {
                Ok(utterance) => {
                    tracing::debug!(
                        duration_ms = utterance.duration().as_millis(),
                        "utterance captured"
                    );
                    on_utterance(utterance);
                }
                Err(Error::CaptureTimeout) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "capture failed");
                    self.backoff();
                }
            }
        }

        tracing::info!("capture loop stopped");
        self.source
    }

    fn calibration_due(&self) -> bool {
        self.last_calibration
            .is_none_or(|at| at.elapsed() >= self.config.recalibrate_every)
    }

    fn backoff(&self) {
        std::thread::sleep(self.config.retry_backoff);
    }
}
