//! Text-to-speech (TTS) processing
//!
//! Speech is produced by an external program (`say` on macOS, `espeak` and
//! friends elsewhere). Each utterance is one child process.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Plays synthesized speech
#[async_trait]
pub trait Synthesizer: Send + Sync + 'static {
    /// Speak `text`, returning when playback ends or `cancel` fires
    ///
    /// After `cancel` fires the utterance must be fully stopped before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis cannot start
    async fn say(&self, text: &str, cancel: CancellationToken) -> Result<()>;
}

/// Speaks through a command-line synthesis program
pub struct CommandSynthesizer {
    program: String,
    voice: String,
    grace: Duration,
}

impl CommandSynthesizer {
    #[must_use]
    pub fn new(config: &VoiceConfig) -> Self {
        Self {
            program: config.tts_command.clone(),
            voice: config.tts_voice.clone(),
            grace: config.stop_grace,
        }
    }
}

#[async_trait]
impl Synthesizer for CommandSynthesizer {
    async fn say(&self, text: &str, cancel: CancellationToken) -> Result<()> {
        let mut child = Command::new(&self.program)
            .arg("-v")
            .arg(&self.voice)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Tts(format!("failed to spawn {}: {e}", self.program)))?;

        let cancelled = tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(status) if !status.success() => {
                        tracing::warn!(program = %self.program, %status, "speech process failed");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "failed to wait for speech process"),
                }
                false
            }
            () = cancel.cancelled() => true,
        };

        if cancelled {
            terminate(&mut child, self.grace).await;
        }

        Ok(())
    }
}

/// Ask the process to exit, then kill it if it outlives `grace`
async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        #[allow(clippy::cast_possible_wrap)]
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            tracing::debug!(pid, error = %e, "SIGTERM failed");
        }
    }

    if tokio::time::timeout(grace, child.wait()).await.is_ok() {
        tracing::trace!("speech process exited after terminate");
        return;
    }

    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "failed to kill speech process");
    } else {
        tracing::debug!("speech process killed after grace period");
    }
}
