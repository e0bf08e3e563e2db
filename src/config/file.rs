//! TOML configuration file loading
//!
//! Supports `~/.config/jarvis/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct JarvisConfigFile {
    /// Assistant identity and wake words
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// Speech output configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Speech recognition configuration
    #[serde(default)]
    pub stt: SttFileConfig,

    /// AI completion backend
    #[serde(default)]
    pub ai: AiFileConfig,

    /// Weather lookup
    #[serde(default)]
    pub weather: WeatherFileConfig,

    /// Microphone capture tuning
    #[serde(default)]
    pub capture: CaptureFileConfig,

    /// Worker pool sizing
    #[serde(default)]
    pub pool: PoolFileConfig,

    /// Reminder store and poller
    #[serde(default)]
    pub reminders: RemindersFileConfig,

    /// Extra application aliases (canonical name → spoken aliases)
    #[serde(default)]
    pub apps: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// Name used when speaking to the AI backend (e.g. "Jarvis")
    pub name: Option<String>,

    /// Wake word variants, including near-homophones the recognizer produces
    pub wake_words: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Speech synthesis program (e.g. "say", "espeak")
    pub tts_command: Option<String>,

    /// Voice passed to the synthesis program
    pub tts_voice: Option<String>,

    /// Grace period before a cancelled utterance is force-killed
    pub stop_grace_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AiFileConfig {
    pub url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WeatherFileConfig {
    pub url: Option<String>,
    pub location: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptureFileConfig {
    pub energy_threshold: Option<f32>,
    pub pause_secs: Option<f32>,
    pub calibration_secs: Option<f32>,
    pub recalibrate_secs: Option<u64>,
    pub listen_timeout_secs: Option<f32>,
    pub phrase_limit_secs: Option<f32>,
    pub retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PoolFileConfig {
    pub workers: Option<usize>,
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemindersFileConfig {
    /// Path to the `SQLite` database
    pub db_path: Option<String>,

    /// Poll period in seconds
    pub poll_secs: Option<u64>,

    /// Fire reminders whose minute was missed instead of dropping them
    pub catch_up: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `JarvisConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> JarvisConfigFile {
    let Some(path) = config_file_path() else {
        return JarvisConfigFile::default();
    };

    if !path.exists() {
        return JarvisConfigFile::default();
    }

    match load_config_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            JarvisConfigFile::default()
        }
    }
}

/// Load a config file from an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn load_config_from(path: &Path) -> Result<JarvisConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/jarvis/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("jarvis").join("config.toml"))
}
