//! Jarvis - Voice-driven command dispatcher
//!
//! This library provides the core of the Jarvis assistant:
//! - Always-on capture with ambient-noise calibration
//! - Wake word detection and command extraction
//! - Ordered intent rules with a bounded AI conversation window
//! - Last-call-wins speech output
//! - One-shot timers and minute-granularity reminders
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Capture thread                       │
//! │   Microphone  →  CaptureLoop  (1s listen windows)   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ try_submit
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Worker pool                         │
//! │   Recognizer (STT + wake word)  →  Dispatcher       │
//! └────────────────────┬────────────────────────────────┘
//!                      │ speak
//! ┌────────────────────▼────────────────────────────────┐
//! │               SpeechOutput                           │
//! │   ← TimerRegistry       ← ReminderPoller            │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod assistant;
pub mod config;
pub mod daemon;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod integrations;
pub mod pool;
pub mod schedule;
pub mod voice;

pub use assistant::{CaptureLoop, Heard, Recognizer};
pub use config::Config;
pub use daemon::Daemon;
pub use db::{DbConn, DbPool, Reminder, ReminderStore, SqliteReminderStore};
pub use dispatch::{Collaborators, ConversationHistory, DispatchSettings, Dispatcher, Intent};
pub use error::{Error, Result};
pub use integrations::{AppAliases, Completion, Launcher, SearchEngine, WeatherService};
pub use pool::{PoolHandle, WorkerPool};
pub use schedule::{ReminderPoller, TimerRegistry};
pub use voice::{Speaker, SpeechOutput, WakeWordDetector};
