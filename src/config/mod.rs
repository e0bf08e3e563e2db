//! Configuration management for Jarvis
//!
//! Values resolve with priority env > TOML file > default.

pub mod file;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use self::file::JarvisConfigFile;
use crate::Result;

/// Wake word variants the recognizer commonly produces for "Jarvis"
pub const DEFAULT_WAKE_WORDS: &[&str] = &["jarvis", "jarvish", "jarves"];

/// Jarvis configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Assistant identity and wake words
    pub assistant: AssistantConfig,

    /// Speech output
    pub voice: VoiceConfig,

    /// Speech recognition backend
    pub stt: SttConfig,

    /// AI completion backend
    pub ai: AiConfig,

    /// Weather lookup
    pub weather: WeatherConfig,

    /// Microphone capture tuning
    pub capture: CaptureConfig,

    /// Recognition/dispatch worker pool
    pub pool: PoolConfig,

    /// Reminder store and poller
    pub reminders: ReminderConfig,

    /// Extra application aliases merged over the built-in table
    pub apps: BTreeMap<String, Vec<String>>,
}

/// Assistant identity
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Name the assistant answers as in AI prompts
    pub name: String,

    /// Wake word variants (lowercase)
    pub wake_words: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "Jarvis".to_string(),
            wake_words: DEFAULT_WAKE_WORDS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Speech output configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Synthesis program, invoked as `<command> -v <voice> <text>`
    pub tts_command: String,

    /// Voice name
    pub tts_voice: String,

    /// Time a cancelled utterance gets to exit before it is killed
    pub stop_grace: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            tts_command: "say".to_string(),
            tts_voice: "Alex".to_string(),
            stop_grace: Duration::from_millis(100),
        }
    }
}

/// Speech recognition configuration
#[derive(Clone)]
pub struct SttConfig {
    /// OpenAI-compatible transcription endpoint
    pub url: String,

    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,

    /// Transcription model
    pub model: String,

    /// Request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for SttConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SttConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            api_key: None,
            model: "whisper-1".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// AI completion configuration
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Generate endpoint (Ollama API)
    pub url: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/generate".to_string(),
            model: "llama3.1:8b".to_string(),
            temperature: 0.3,
            max_tokens: 100,
            timeout: Duration::from_secs(8),
        }
    }
}

/// Weather lookup configuration
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// Service base URL
    pub url: String,

    /// Location used for "weather" commands
    pub location: String,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            url: "http://wttr.in".to_string(),
            location: "ahmedabad".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Microphone capture tuning
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Minimum RMS energy treated as speech (floor for dynamic calibration)
    pub energy_threshold: f32,

    /// Trailing silence that ends a phrase
    pub pause: Duration,

    /// Ambient noise sampling window for calibration
    pub calibration: Duration,

    /// Minimum wall-clock time between recalibrations
    pub recalibrate_every: Duration,

    /// How long to wait for a phrase to start
    pub listen_timeout: Duration,

    /// Hard cap on phrase length
    pub phrase_limit: Duration,

    /// Sleep after a capture fault before retrying
    pub retry_backoff: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.01,
            pause: Duration::from_millis(800),
            calibration: Duration::from_millis(500),
            recalibrate_every: Duration::from_secs(300),
            listen_timeout: Duration::from_secs(1),
            phrase_limit: Duration::from_secs(8),
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Worker pool sizing
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Concurrent recognition/dispatch workers
    pub workers: usize,

    /// Jobs that may wait for a worker before submissions are rejected
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 16,
        }
    }
}

/// Reminder store and poller configuration
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// `SQLite` database path
    pub db_path: PathBuf,

    /// Poll period
    pub poll_interval: Duration,

    /// Also fire reminders whose minute already passed
    pub catch_up: bool,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            db_path: data_dir().join("jarvis.db"),
            poll_interval: Duration::from_secs(60),
            catch_up: false,
        }
    }
}

/// Return the data directory (`~/.local/share/jarvis` on Linux)
pub fn data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("jarvis"))
}

impl Default for Config {
    fn default() -> Self {
        Self::from_sources(JarvisConfigFile::default(), |_| None)
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// An explicit `path` must exist and parse; the default path is optional.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file cannot be loaded
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = match path {
            Some(path) => file::load_config_from(path)?,
            None => file::load_config_file(),
        };

        let config = Self::from_sources(fc, |key| std::env::var(key).ok());

        if let Some(parent) = config.reminders.db_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %e, "failed to create data directory");
            }
        }

        Ok(config)
    }

    /// Build configuration from a parsed file and an environment lookup
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn from_sources(fc: JarvisConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let assistant_defaults = AssistantConfig::default();
        let assistant = AssistantConfig {
            name: fc.assistant.name.unwrap_or(assistant_defaults.name),
            wake_words: fc
                .assistant
                .wake_words
                .map(|words| {
                    words
                        .into_iter()
                        .map(|w| w.trim().to_lowercase())
                        .filter(|w| !w.is_empty())
                        .collect()
                })
                .unwrap_or(assistant_defaults.wake_words),
        };

        let voice_defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            tts_command: env("JARVIS_TTS_COMMAND")
                .or(fc.voice.tts_command)
                .unwrap_or(voice_defaults.tts_command),
            tts_voice: env("JARVIS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(voice_defaults.tts_voice),
            stop_grace: fc
                .voice
                .stop_grace_ms
                .map_or(voice_defaults.stop_grace, Duration::from_millis),
        };

        let stt_defaults = SttConfig::default();
        let stt = SttConfig {
            url: env("JARVIS_STT_URL")
                .or(fc.stt.url)
                .unwrap_or(stt_defaults.url),
            api_key: env("JARVIS_STT_API_KEY")
                .or_else(|| env("OPENAI_API_KEY"))
                .or(fc.stt.api_key),
            model: fc.stt.model.unwrap_or(stt_defaults.model),
            timeout: fc
                .stt
                .timeout_secs
                .map_or(stt_defaults.timeout, Duration::from_secs),
        };

        let ai_defaults = AiConfig::default();
        let ai = AiConfig {
            url: env("JARVIS_AI_URL").or(fc.ai.url).unwrap_or(ai_defaults.url),
            model: env("JARVIS_AI_MODEL")
                .or(fc.ai.model)
                .unwrap_or(ai_defaults.model),
            temperature: fc.ai.temperature.unwrap_or(ai_defaults.temperature),
            max_tokens: fc.ai.max_tokens.unwrap_or(ai_defaults.max_tokens),
            timeout: fc
                .ai
                .timeout_secs
                .map_or(ai_defaults.timeout, Duration::from_secs),
        };

        let weather_defaults = WeatherConfig::default();
        let weather = WeatherConfig {
            url: fc.weather.url.unwrap_or(weather_defaults.url),
            location: env("JARVIS_WEATHER_LOCATION")
                .or(fc.weather.location)
                .unwrap_or(weather_defaults.location),
            timeout: fc
                .weather
                .timeout_secs
                .map_or(weather_defaults.timeout, Duration::from_secs),
        };

        let capture_defaults = CaptureConfig::default();
        let secs = |value: Option<f32>, default: Duration| {
            value
                .filter(|v| v.is_finite() && *v > 0.0)
                .map_or(default, Duration::from_secs_f32)
        };
        let capture = CaptureConfig {
            energy_threshold: fc
                .capture
                .energy_threshold
                .unwrap_or(capture_defaults.energy_threshold),
            pause: secs(fc.capture.pause_secs, capture_defaults.pause),
            calibration: secs(fc.capture.calibration_secs, capture_defaults.calibration),
            recalibrate_every: fc
                .capture
                .recalibrate_secs
                .map_or(capture_defaults.recalibrate_every, Duration::from_secs),
            listen_timeout: secs(
                fc.capture.listen_timeout_secs,
                capture_defaults.listen_timeout,
            ),
            phrase_limit: secs(fc.capture.phrase_limit_secs, capture_defaults.phrase_limit),
            retry_backoff: fc
                .capture
                .retry_backoff_ms
                .map_or(capture_defaults.retry_backoff, Duration::from_millis),
        };

        let pool_defaults = PoolConfig::default();
        let pool = PoolConfig {
            workers: env("JARVIS_WORKERS")
                .and_then(|s| s.parse().ok())
                .or(fc.pool.workers)
                .filter(|n| *n > 0)
                .unwrap_or(pool_defaults.workers),
            queue_capacity: fc
                .pool
                .queue_capacity
                .filter(|n| *n > 0)
                .unwrap_or(pool_defaults.queue_capacity),
        };

        let reminder_defaults = ReminderConfig::default();
        let reminders = ReminderConfig {
            db_path: env("JARVIS_DB_PATH")
                .or(fc.reminders.db_path)
                .map_or(reminder_defaults.db_path, PathBuf::from),
            poll_interval: fc
                .reminders
                .poll_secs
                .filter(|s| *s > 0)
                .map_or(reminder_defaults.poll_interval, Duration::from_secs),
            catch_up: fc.reminders.catch_up.unwrap_or(reminder_defaults.catch_up),
        };

        Self {
            assistant,
            voice,
            stt,
            ai,
            weather,
            capture,
            pool,
            reminders,
            apps: fc.apps,
        }
    }
}
