//! Speech-to-text (STT) processing

use std::time::Duration;

use async_trait::async_trait;

use super::Utterance;
use crate::config::SttConfig;
use crate::{Error, Result};

/// Turns captured audio into text
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe one utterance
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSpeech`] when nothing intelligible was said, or
    /// [`Error::Stt`] when the service is unavailable
    async fn recognize(&self, utterance: &Utterance) -> Result<String>;
}

/// Response from an OpenAI-compatible transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes speech through an OpenAI-compatible Whisper endpoint
pub struct WhisperStt {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl WhisperStt {
    /// Create a new STT client
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URL is empty or the HTTP client cannot
    /// be built
    pub fn new(config: &SttConfig) -> Result<Self> {
        let mut stt = Self::with_timeout(config.url.clone(), config.model.clone(), config.timeout)?;
        stt.api_key.clone_from(&config.api_key);
        Ok(stt)
    }

    /// Create a client for `url` with an explicit request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URL is empty or the HTTP client cannot
    /// be built
    pub fn with_timeout(url: String, model: String, timeout: Duration) -> Result<Self> {
        if url.trim().is_empty() {
            return Err(Error::Config("STT endpoint URL required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url,
            api_key: None,
            model,
        })
    }
}

#[async_trait]
impl SpeechToText for WhisperStt {
    async fn recognize(&self, utterance: &Utterance) -> Result<String> {
        let audio = utterance.to_wav()?;
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "Whisper request failed");
            Error::Stt(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("failed to parse response: {e}")))?;

        let text = result.text.trim();
        if text.is_empty() {
            return Err(Error::NoSpeech);
        }

        tracing::debug!(transcript = %text, "transcription complete");
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    fn utterance() -> Utterance {
        Utterance::new(vec![0.1; 1600], 16_000)
    }

    #[test]
    fn test_empty_url_rejected() {
        let config = SttConfig {
            url: "  ".to_string(),
            ..SttConfig::default()
        };
        assert!(matches!(WhisperStt::new(&config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_stalled_endpoint_times_out() {
        // Accepts connections but never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let stt = WhisperStt::with_timeout(
            format!("http://{addr}/v1/audio/transcriptions"),
            "whisper-1".to_string(),
            Duration::from_millis(300),
        )
        .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(10), stt.recognize(&utterance()))
            .await
            .expect("request should time out on its own");
        assert!(matches!(result, Err(Error::Stt(_))));

        server.abort();
    }
}
