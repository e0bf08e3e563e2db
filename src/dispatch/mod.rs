//! Command dispatch
//!
//! Routes a normalized command to exactly one handler and speaks exactly one
//! response. Collaborator failures become spoken fallbacks; nothing here
//! returns an error to the caller.

mod history;
mod rules;

use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::config::Config;
use crate::db::ReminderStore;
use crate::integrations::{
    AppAliases, Completion, CompletionOptions, Launcher, SearchEngine, WeatherService, search_url,
};
use crate::schedule::TimerRegistry;
use crate::voice::Speaker;

pub use history::{ConversationHistory, ConversationTurn, HISTORY_CAPACITY, Role};
pub use rules::{
    DEFAULT_TIMER_LABEL, Intent, RULES, ReminderRequest, TimerRequest, app_name, classify,
    parse_reminder, parse_timer, search_query,
};

const WEATHER_UNAVAILABLE: &str = "Weather unavailable";
const AI_UNAVAILABLE: &str = "AI unavailable";

/// External services the dispatcher calls into
#[derive(Clone)]
pub struct Collaborators {
    pub speaker: Arc<dyn Speaker>,
    pub weather: Arc<dyn WeatherService>,
    pub completion: Arc<dyn Completion>,
    pub launcher: Arc<dyn Launcher>,
    pub reminders: Arc<dyn ReminderStore>,
}

/// Fixed dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Name the assistant answers as in AI prompts
    pub assistant_name: String,
    pub weather_location: String,
    pub search_engine: SearchEngine,
    pub completion: CompletionOptions,
    pub aliases: AppAliases,
}

impl DispatchSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            assistant_name: config.assistant.name.clone(),
            weather_location: config.weather.location.clone(),
            search_engine: SearchEngine::Google,
            completion: CompletionOptions {
                temperature: config.ai.temperature,
                max_tokens: config.ai.max_tokens,
            },
            aliases: AppAliases::new(&config.apps),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Routes commands to handlers
pub struct Dispatcher {
    collaborators: Collaborators,
    timers: TimerRegistry,
    history: ConversationHistory,
    settings: DispatchSettings,
}

impl Dispatcher {
    #[must_use]
    pub fn new(collaborators: Collaborators, timers: TimerRegistry, settings: DispatchSettings) -> Self {
        Self {
            collaborators,
            timers,
            history: ConversationHistory::default(),
            settings,
        }
    }

    /// Conversation context used by the AI fallback
    #[must_use]
    pub const fn history(&self) -> &ConversationHistory {
        &self.history
    }

    #[must_use]
    pub const fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    /// Handle `command` against the current local time
    pub async fn dispatch(&self, command: &str) -> Intent {
        self.dispatch_at(command, Local::now()).await
    }

    /// Handle `command` as if the current time were `now`
    ///
    /// Speaks exactly one response and returns the intent that handled it.
    pub async fn dispatch_at(&self, command: &str, now: DateTime<Local>) -> Intent {
        let command = command.trim().to_lowercase();
        let intent = classify(&command);

        tracing::info!(command = %command, ?intent, "dispatching command");

        let reply = match intent {
            Intent::Time => now.format("%I:%M %p").to_string(),
            Intent::Date => now.format("%A, %B %d").to_string(),
            Intent::Weather => self.weather().await,
            Intent::Greeting => "Hello".to_string(),
            Intent::OpenApp => self.open_app(&command).await,
            Intent::Search => self.search(&command).await,
            Intent::Timer => self.start_timer(&command),
            Intent::Reminder => self.add_reminder(&command, now).await,
            Intent::Ask => self.ask(&command).await,
        };

        self.collaborators.speaker.speak(&reply);
        intent
    }

    async fn weather(&self) -> String {
        match self
            .collaborators
            .weather
            .lookup(&self.settings.weather_location)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, "weather lookup failed");
                WEATHER_UNAVAILABLE.to_string()
            }
        }
    }

    async fn open_app(&self, command: &str) -> String {
        let Some(name) = app_name(command) else {
            return "App not found".to_string();
        };
        let app = self.settings.aliases.resolve(name);

        let launcher = Arc::clone(&self.collaborators.launcher);
        let target = app.clone();
        let launched = tokio::task::spawn_blocking(move || launcher.open_app(&target)).await;

        match launched {
            Ok(Ok(())) => format!("Opening {app}"),
            Ok(Err(e)) => {
                tracing::warn!(app = %app, error = %e, "app launch failed");
                "App not found".to_string()
            }
            Err(e) => {
                tracing::warn!(app = %app, error = %e, "app launch task failed");
                "App not found".to_string()
            }
        }
    }

    async fn search(&self, command: &str) -> String {
        let Some(query) = search_query(command) else {
            return "Search failed".to_string();
        };
        let url = search_url(self.settings.search_engine, query);

        let launcher = Arc::clone(&self.collaborators.launcher);
        let opened = tokio::task::spawn_blocking(move || launcher.open_url(&url)).await;

        match opened {
            Ok(Ok(())) => "Searching".to_string(),
            Ok(Err(e)) => {
                tracing::warn!(query, error = %e, "search failed");
                "Search failed".to_string()
            }
            Err(e) => {
                tracing::warn!(query, error = %e, "search task failed");
                "Search failed".to_string()
            }
        }
    }

    fn start_timer(&self, command: &str) -> String {
        let Some((request, duration)) =
            parse_timer(command).and_then(|r| r.duration().map(|d| (r, d)))
        else {
            return "Specify minutes".to_string();
        };

        self.timers.start(duration, &request.label);
        format!("{} set for {} minutes", request.label, request.minutes)
    }

    async fn add_reminder(&self, command: &str, now: DateTime<Local>) -> String {
        let request = match parse_reminder(command, now.date_naive()) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "unparseable reminder");
                return "Could not set reminder".to_string();
            }
        };

        let store = Arc::clone(&self.collaborators.reminders);
        let (message, remind_at) = (request.message.clone(), request.remind_at);
        let inserted = tokio::task::spawn_blocking(move || store.insert(&message, remind_at)).await;

        match inserted {
            Ok(Ok(id)) => {
                tracing::info!(id, message = %request.message, remind_at = %request.remind_at, "reminder added");
                format!(
                    "Reminder added: {} at {}",
                    request.message,
                    request.remind_at.format("%H:%M")
                )
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to store reminder");
                "Could not set reminder".to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "reminder insert task failed");
                "Could not set reminder".to_string()
            }
        }
    }

    async fn ask(&self, command: &str) -> String {
        let prompt = self
            .history
            .build_prompt(&self.settings.assistant_name, command);

        match self
            .collaborators
            .completion
            .complete(&prompt, self.settings.completion)
            .await
        {
            Ok(reply) => {
                self.history.record_exchange(command, &reply);
                reply
            }
            Err(e) => {
                tracing::warn!(error = %e, "AI completion failed");
                AI_UNAVAILABLE.to_string()
            }
        }
    }
}
