//! External service integrations
//!
//! Narrow interfaces over the collaborators the dispatcher talks to, with one
//! concrete implementation each.

mod launcher;
mod ollama;
mod weather;

pub use launcher::{AppAliases, Launcher, SearchEngine, SystemLauncher, search_url};
pub use ollama::{Completion, CompletionOptions, OllamaClient};
pub use weather::{WeatherService, WttrClient};
