//! Error types for Jarvis

use thiserror::Error;

/// Result type alias for Jarvis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Jarvis
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or stream error
    #[error("audio error: {0}")]
    Audio(String),

    /// No phrase started before the listen timeout elapsed
    #[error("listen timed out waiting for speech")]
    CaptureTimeout,

    /// Recognizer heard nothing intelligible
    #[error("no speech detected")]
    NoSpeech,

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// AI completion backend error
    #[error("AI error: {0}")]
    Ai(String),

    /// Weather lookup error
    #[error("weather error: {0}")]
    Weather(String),

    /// Application or browser launch error
    #[error("launch error: {0}")]
    Launch(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Malformed reminder request
    #[error("reminder error: {0}")]
    Reminder(String),

    /// Worker pool queue is at capacity
    #[error("worker pool queue is full")]
    PoolFull,

    /// Worker pool has shut down
    #[error("worker pool is closed")]
    PoolClosed,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
