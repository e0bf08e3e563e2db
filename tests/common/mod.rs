//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jarvis::integrations::CompletionOptions;
use jarvis::schedule::TimerRegistry;
use jarvis::voice::{SpeechToText, Utterance};
use jarvis::{
    Collaborators, Completion, DbPool, DispatchSettings, Dispatcher, Error, Launcher, Result,
    Speaker, SqliteReminderStore, WeatherService, db,
};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Records every line instead of speaking it
#[derive(Default)]
pub struct RecordingSpeaker {
    lines: Mutex<Vec<String>>,
}

impl RecordingSpeaker {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn count(&self, text: &str) -> usize {
        self.lines().iter().filter(|l| *l == text).count()
    }
}

impl Speaker for RecordingSpeaker {
    fn speak(&self, text: &str) {
        self.lines.lock().unwrap().push(text.to_string());
    }
}

/// Weather service returning a fixed report, or failing
pub struct FakeWeather {
    pub report: Option<String>,
    pub locations: Mutex<Vec<String>>,
}

impl FakeWeather {
    pub fn reporting(report: Option<&str>) -> Self {
        Self {
            report: report.map(ToString::to_string),
            locations: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WeatherService for FakeWeather {
    async fn lookup(&self, location: &str) -> Result<String> {
        self.locations.lock().unwrap().push(location.to_string());
        self.report
            .clone()
            .ok_or_else(|| Error::Weather("timed out".to_string()))
    }
}

/// Completion backend replaying scripted replies and recording prompts
#[derive(Default)]
pub struct FakeCompletion {
    pub replies: Mutex<VecDeque<Result<String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeCompletion {
    pub fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok((*r).to_string())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completion for FakeCompletion {
    async fn complete(&self, prompt: &str, _options: CompletionOptions) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Ai("timed out".to_string())))
    }
}

/// Launcher that records requests and can be told to fail
#[derive(Default)]
pub struct FakeLauncher {
    pub fail: bool,
    pub apps: Mutex<Vec<String>>,
    pub urls: Mutex<Vec<String>>,
}

impl Launcher for FakeLauncher {
    fn open_app(&self, app: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Launch(format!("{app} not installed")));
        }
        self.apps.lock().unwrap().push(app.to_string());
        Ok(())
    }

    fn open_url(&self, url: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Launch("no browser".to_string()));
        }
        self.urls.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Recognizer returning scripted transcripts
#[derive(Default)]
pub struct FakeStt {
    pub transcripts: Mutex<VecDeque<Result<String>>>,
}

impl FakeStt {
    pub fn hearing(transcripts: &[&str]) -> Self {
        Self {
            transcripts: Mutex::new(
                transcripts.iter().map(|t| Ok((*t).to_string())).collect(),
            ),
        }
    }
}

#[async_trait]
impl SpeechToText for FakeStt {
    async fn recognize(&self, _utterance: &Utterance) -> Result<String> {
        self.transcripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(Error::NoSpeech))
    }
}

/// A dispatcher wired to fakes, plus handles on each fake
pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub speaker: Arc<RecordingSpeaker>,
    pub weather: Arc<FakeWeather>,
    pub completion: Arc<FakeCompletion>,
    pub launcher: Arc<FakeLauncher>,
    pub store: Arc<SqliteReminderStore>,
    pub timers: TimerRegistry,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakeCompletion::default(), FakeLauncher::default())
    }

    pub fn with(completion: FakeCompletion, launcher: FakeLauncher) -> Self {
        Self::build(
            FakeWeather::reporting(Some("ahmedabad: ☀️ +31°C")),
            completion,
            launcher,
        )
    }

    pub fn build(weather: FakeWeather, completion: FakeCompletion, launcher: FakeLauncher) -> Self {
        let speaker = Arc::new(RecordingSpeaker::default());
        let weather = Arc::new(weather);
        let completion = Arc::new(completion);
        let launcher = Arc::new(launcher);
        let store = Arc::new(SqliteReminderStore::new(setup_test_db()));
        let timers = TimerRegistry::new(speaker.clone());

        let collaborators = Collaborators {
            speaker: speaker.clone(),
            weather: weather.clone(),
            completion: completion.clone(),
            launcher: launcher.clone(),
            reminders: store.clone(),
        };
        let dispatcher = Arc::new(Dispatcher::new(
            collaborators,
            timers.clone(),
            DispatchSettings::default(),
        ));

        Self {
            dispatcher,
            speaker,
            weather,
            completion,
            launcher,
            store,
            timers,
        }
    }
}

/// Let spawned tasks run until `done` holds, or panic after a while
pub async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
