//! Wake word detection
//!
//! Works on recognized text: a wake variant may open the phrase or appear
//! anywhere inside it as a whole word, and the command is whatever follows.

use crate::{Error, Result};

/// Detects wake words in transcripts
#[derive(Debug, Clone)]
pub struct WakeWordDetector {
    wake_words: Vec<String>,
}

impl WakeWordDetector {
    /// Create a new wake word detector
    ///
    /// # Arguments
    ///
    /// * `wake_words` - Variants to detect, in priority order (e.g., "jarvis", "jarves")
    ///
    /// # Errors
    ///
    /// Returns error if no usable wake word is given
    pub fn new(wake_words: Vec<String>) -> Result<Self> {
        let normalized: Vec<String> = wake_words
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        if normalized.is_empty() {
            return Err(Error::Config("at least one wake word is required".to_string()));
        }

        tracing::debug!(wake_words = ?normalized, "wake word detector initialized");
        Ok(Self {
            wake_words: normalized,
        })
    }

    /// Extract the command following a wake word
    ///
    /// Returns `None` when no variant is present and `Some("")` when the wake
    /// word is said on its own. Only the first matching variant is used.
    #[must_use]
    pub fn extract_command(&self, transcript: &str) -> Option<String> {
        let phrase = transcript.trim().to_lowercase();

        self.wake_words.iter().find_map(|wake| {
            find_word(&phrase, wake).map(|end| {
                let command = clean_command(&phrase[end..]);
                tracing::debug!(wake_word = %wake, command = %command, "wake word detected");
                command
            })
        })
    }
}

/// Byte offset just past the first whole-word occurrence of `word`
fn find_word(phrase: &str, word: &str) -> Option<usize> {
    phrase.match_indices(word).find_map(|(start, _)| {
        let end = start + word.len();
        let open = phrase[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let close = phrase[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        (open && close).then_some(end)
    })
}

/// Drop the separator after the wake word and the sentence punctuation
/// transcribers append ("jarvis, open vscode." reads as "open vscode")
fn clean_command(rest: &str) -> String {
    rest.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?' | ':' | '\''))
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?'))
        .to_string()
}
