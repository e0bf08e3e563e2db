//! Bounded conversation history for the AI fallback

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Number of turns kept as AI context
pub const HISTORY_CAPACITY: usize = 6;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One line of conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    fn render(&self, assistant_name: &str) -> String {
        match self.role {
            Role::User => format!("User: {}", self.text),
            Role::Assistant => format!("{assistant_name}: {}", self.text),
        }
    }
}

/// Sliding window of the most recent turns, oldest evicted first
///
/// All mutation goes through one lock, so an exchange (user turn plus reply)
/// is always appended as a unit.
#[derive(Debug)]
pub struct ConversationHistory {
    turns: Mutex<VecDeque<ConversationTurn>>,
    capacity: usize,
}

impl ConversationHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a completed exchange, evicting from the front past capacity
    pub fn record_exchange(&self, prompt: &str, reply: &str) {
        let mut turns = self.lock();
        turns.push_back(ConversationTurn::user(prompt));
        turns.push_back(ConversationTurn::assistant(reply));
        while turns.len() > self.capacity {
            turns.pop_front();
        }
    }

    /// Copy of the current window in insertion order
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Render the prompt sent to the completion backend
    ///
    /// History lines come first, then the new user line, then an open
    /// assistant line for the model to complete.
    #[must_use]
    pub fn build_prompt(&self, assistant_name: &str, prompt: &str) -> String {
        let history = self
            .snapshot()
            .iter()
            .map(|turn| turn.render(assistant_name))
            .collect::<Vec<_>>()
            .join("\n");

        format!("{history}\nUser: {prompt}\n{assistant_name}:")
    }

    // A poisoned lock only means a panic mid-append; the deque is still valid
    fn lock(&self) -> MutexGuard<'_, VecDeque<ConversationTurn>> {
        self.turns
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}
